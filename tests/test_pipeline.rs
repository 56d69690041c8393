use debounce_pipeline::{
    run_source, PipelineBuilder, PipelineConfig, PipelineError, RunningPipeline,
};
use std::io::Cursor;
use std::thread;
use std::time::{Duration, Instant};

const IDLE: Duration = Duration::from_millis(200);
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn start(capacity: usize, idle: Duration) -> RunningPipeline {
    PipelineBuilder::new()
        .buffer_capacity(capacity)
        .idle_interval(idle)
        .build()
        .expect("Pipeline build failed")
        .start()
        .expect("Pipeline start failed")
}

fn recv_n(running: &RunningPipeline, n: usize) -> Vec<i64> {
    (0..n)
        .map(|_| {
            running
                .output()
                .recv_timeout(RECV_TIMEOUT)
                .expect("No output before timeout")
        })
        .collect()
}

#[test]
fn test_filters_and_idle_flush() {
    let running = start(10, IDLE);

    for v in [-5, 0, 3, 9, 4, 12] {
        running.send(v).expect("Send failed");
    }
    let paused_at = Instant::now();

    assert_eq!(recv_n(&running, 3), vec![3, 9, 12]);
    assert!(paused_at.elapsed() >= IDLE * 8 / 10);

    assert!(running.finish().expect("Finish failed").is_empty());
}

#[test]
fn test_overflow_keeps_newest_values() {
    let running = start(2, IDLE);

    for v in [3, 6, 9] {
        running.send(v).expect("Send failed");
    }

    assert_eq!(recv_n(&running, 2), vec![6, 9]);
    assert!(running.finish().expect("Finish failed").is_empty());
}

#[test]
fn test_separate_bursts_flush_separately() {
    let running = start(10, IDLE);

    running.send(3).expect("Send failed");
    running.send(6).expect("Send failed");
    assert_eq!(recv_n(&running, 2), vec![3, 6]);

    running.send(9).expect("Send failed");
    assert_eq!(recv_n(&running, 1), vec![9]);

    let metrics = running.stage_metrics(2).expect("Metrics not found").clone();
    assert!(running.finish().expect("Finish failed").is_empty());
    assert_eq!(metrics.total_flushes(), 2);
}

#[test]
fn test_debounce_holds_output_while_input_flows() {
    let idle = Duration::from_millis(400);
    let running = start(20, idle);

    for i in 1..=8 {
        running.send(i * 3).expect("Send failed");
        thread::sleep(idle / 10);
        assert!(
            running.output().try_recv().is_err(),
            "flushed while input was still arriving"
        );
    }

    assert_eq!(recv_n(&running, 8), (1..=8).map(|i| i * 3).collect::<Vec<_>>());
    running.shutdown().expect("Shutdown failed");
}

#[test]
fn test_flush_when_full() {
    let running = PipelineBuilder::new()
        .buffer_capacity(3)
        .idle_interval(Duration::from_secs(30))
        .flush_when_full(true)
        .build()
        .expect("Pipeline build failed")
        .start()
        .expect("Pipeline start failed");

    for v in 1..=12 {
        running.send(v).expect("Send failed");
    }

    // 3, 6, 9, 12 survive the filters; the first three fill the buffer.
    assert_eq!(recv_n(&running, 3), vec![3, 6, 9]);
    assert_eq!(running.finish().expect("Finish failed"), vec![12]);
}

#[test]
fn test_buffered_channels() {
    let running = PipelineBuilder::new()
        .buffer_capacity(5)
        .idle_interval(IDLE)
        .channel_capacity(16)
        .build()
        .expect("Pipeline build failed")
        .start()
        .expect("Pipeline start failed");

    for v in [30, -3, 31, 33] {
        running.send(v).expect("Send failed");
    }
    assert_eq!(recv_n(&running, 2), vec![30, 33]);
    running.shutdown().expect("Shutdown failed");
}

#[test]
fn test_source_feeds_pipeline() {
    let mut running = start(10, Duration::from_secs(30));
    let input = running.input().expect("Input closed");
    running.close_input();

    let source = thread::spawn(move || {
        run_source(Cursor::new("-5\n0\nthree\n3\n9\n4\n12\nexit\n15\n"), &input, |_| {})
    });

    let summary = source.join().expect("Source panicked").expect("Source failed");
    assert_eq!(summary.accepted, 6);
    assert_eq!(summary.rejected, 1);
    assert!(summary.exited);

    // Source dropped its sender on exit, so the graph drains and unwinds.
    assert_eq!(running.finish().expect("Finish failed"), vec![3, 9, 12]);
}

#[test]
fn test_metrics_track_each_stage() {
    let running = start(10, Duration::from_secs(30));
    for v in [-1, 0, 1, 2, 3, 6] {
        running.send(v).expect("Send failed");
    }
    let first = running.stage_metrics(0).expect("Metrics not found").clone();
    let second = running.stage_metrics(1).expect("Metrics not found").clone();
    let buffer = running.stage_metrics(2).expect("Metrics not found").clone();
    let summary = running.metrics_summary();

    assert_eq!(running.finish().expect("Finish failed"), vec![3, 6]);
    assert_eq!(first.total_received(), 6);
    assert_eq!(first.total_dropped(), 2);
    assert_eq!(second.total_received(), 4);
    assert_eq!(second.total_emitted(), 2);
    assert_eq!(buffer.total_emitted(), 2);
    assert!(summary.contains("multiple_of_three"));
}

#[test]
fn test_config_drives_builder() {
    let config = PipelineConfig::from_toml_str(
        r#"
        [buffer]
        capacity = 2
        idle_interval_ms = 100
        "#,
    )
    .expect("Config parse failed");

    let running = PipelineBuilder::from_config(&config)
        .build()
        .expect("Pipeline build failed")
        .start()
        .expect("Pipeline start failed");

    for v in [3, 6, 9] {
        running.send(v).expect("Send failed");
    }
    assert_eq!(recv_n(&running, 2), vec![6, 9]);
    running.shutdown().expect("Shutdown failed");
}

#[test]
fn test_invalid_config_fails_at_build() {
    let mut config = PipelineConfig::default();
    config.buffer.idle_interval_ms = 0;
    assert!(matches!(
        PipelineBuilder::from_config(&config).build(),
        Err(PipelineError::InvalidConfig(_))
    ));
}
