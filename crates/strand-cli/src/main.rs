use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;

use strand_core::{JobError, JobHandle, JobState, QueueRegistry};

#[derive(Debug, Serialize)]
struct RenderOrder {
    document: String,
    pages: u32,
}

/// Poll until the job settles. Demo-style; hosts that care use callbacks.
async fn wait_settled(handle: &JobHandle) -> JobState {
    loop {
        let state = handle.state();
        if state.is_terminal() {
            return state;
        }
        sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // (A) One engine: a registry with a standalone main loop, plus a queue
    //     of our own.
    let registry = QueueRegistry::standalone();
    tracing::info!("engine ready");
    let queue = registry.create_queue();
    println!("created queue {}", queue.id());

    // (B) Jobs run strictly one at a time, in dispatch order. While a slow
    //     one works, the next can still be configured and observed.
    queue
        .dispatch(|_| {
            std::thread::sleep(Duration::from_millis(50));
            Ok(())
        })
        .unwrap();

    let order = RenderOrder {
        document: "quarterly-report.md".into(),
        pages: 3,
    };
    let handle = queue
        .dispatch(|ctx| {
            let document: String = ctx.import("document")?;
            let pages: u32 = ctx.import("pages")?;
            ctx.export("rendered", &format!("{document} ({pages} pages)"))?;
            Ok(())
        })
        .unwrap()
        .with(&order)
        .unwrap();
    handle.status(|state| println!("  render job is now {state}"));
    handle.then(|output| println!("  render output: {output}"));
    wait_settled(&handle).await;

    // (C) A failing body settles its own job and nothing else.
    let failing = queue
        .dispatch(|_| Err(JobError::failed("upstream unavailable")))
        .unwrap();
    failing.error(|e| println!("  job failed: {e}"));
    wait_settled(&failing).await;

    // (D) Pending jobs can be cancelled; running ones cannot.
    queue
        .dispatch(|_| {
            std::thread::sleep(Duration::from_millis(50));
            Ok(())
        })
        .unwrap();
    let victim = queue.dispatch(|_| Ok(())).unwrap();
    victim.cancel();
    println!("cancelled a pending job: state={}", victim.state());

    // (E) The main queue runs its jobs on the main loop.
    let on_main = registry
        .main_queue()
        .dispatch(|ctx| {
            let thread = std::thread::current().name().map(str::to_string);
            ctx.export("thread", &thread)?;
            Ok(())
        })
        .unwrap();
    wait_settled(&on_main).await;
    println!("main-queue job ran on {}", on_main.output().unwrap());

    // (F) Destroying a queue cancels what is pending and stops the lane.
    let scratch = registry.create_queue();
    scratch
        .dispatch(|_| {
            std::thread::sleep(Duration::from_millis(50));
            Ok(())
        })
        .unwrap();
    scratch.dispatch(|_| Ok(())).unwrap();
    scratch.dispatch(|_| Ok(())).unwrap();
    scratch.destroy().unwrap();
    if let Err(e) = scratch.dispatch(|_| Ok(())) {
        println!("dispatch after destroy: {e}");
    }
    sleep(Duration::from_millis(100)).await;
    println!("scratch counts after destroy: {:?}", scratch.counts());

    // (G) Serial order makes draining easy: wait out a sentinel job.
    let sentinel = queue.dispatch(|_| Ok(())).unwrap();
    wait_settled(&sentinel).await;
    println!(
        "final counts: {}",
        serde_json::to_string(&queue.counts()).unwrap()
    );
}
