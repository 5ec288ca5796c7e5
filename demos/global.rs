use std::thread;

fn main() {
    // Exits the process if ./logs/global_0.log cannot be opened
    seqlog::set("./logs/", "INFO", "global");

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            thread::spawn(move || {
                for job in 0..5 {
                    seqlog::info!("worker", worker, "finished job", job);
                }
            })
        })
        .collect();
    for worker in workers {
        let _ = worker.join();
    }

    seqlog::debug!("not written, the logger is at info level");
}
