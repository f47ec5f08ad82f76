use futures_util::StreamExt;
use tasklink::{ConnectionManager, Event};

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let url = std::env::var("TASKLINK_URL")
        .map_err(|_| {
            println!("No TASKLINK_URL env var or invalid");
            std::process::exit(1);
        })
        .unwrap();
    let task = std::env::var("TASKLINK_TASK").ok();

    let manager = ConnectionManager::from_url(&url).unwrap();
    let mut events = manager.events();

    if let Err(e) = manager.connect(task.as_deref()).await {
        log::warn!("First connect failed, keep retrying: {}", e);
    }

    while let Some(event) = events.next().await {
        match event {
            Event::Progress(envelope) | Event::Log(envelope) | Event::Status(envelope) => {
                log::info!("[{}] {}: {:?}", envelope.task_id, envelope.r#type, envelope.data)
            }
            Event::Complete(envelope) => {
                log::info!("Task {} complete", envelope.task_id);
                break;
            }
            Event::Error(err) => log::error!("{}", err),
            other => log::debug!("{:?}", other),
        }
    }

    manager.disconnect().await;
}
