//! Integration tests for the convergence loop and the raw encoder

mod common;

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use common::{bytes_for, FakeMedia};
use replay_maker::domain::model::{MediaProbe, Segment, TimeRange, TimeSpec};
use replay_maker::engine::convergence::Phase;
use replay_maker::engine::{initial_targets, ConvergenceEngine, ConvergenceTuning, RawEncoder, SegmentJob, SizeState, Verdict};
use replay_maker::error::ReplayError;
use replay_maker::ports::RateControl;

// Test utilities

fn job(dir: &Path, index: usize, seconds: f64) -> SegmentJob {
    let output = dir.join(format!("{}__clip__0.mp4", index));
    SegmentJob {
        segment: Segment {
            input_index: index,
            range_index: 0,
            source: PathBuf::from("/clips/clip.mp4"),
            range: TimeRange::new(TimeSpec::ZERO, TimeSpec::from_seconds(seconds)).unwrap(),
            probe: MediaProbe {
                width: 1280,
                height: 720,
                fps: 30.0,
                ..MediaProbe::default()
            },
        },
        command: Some("-c:v libx264".into()),
        first_pass: vec!["-preset fast".into()],
        second_pass: vec!["-preset slow".into()],
        audio_kbps: 0,
        pass_log: output.with_extension("passlog"),
        output,
    }
}

fn tuning() -> ConvergenceTuning {
    ConvergenceTuning {
        min_output_bytes: 95_000,
        max_output_bytes: 105_000,
        ..ConvergenceTuning::default()
    }
}

// Convergence tests

#[tokio::test]
async fn test_half_rate_encoder_converges() {
    let dir = TempDir::new().unwrap();
    let jobs = vec![job(dir.path(), 0, 10.0), job(dir.path(), 1, 20.0)];
    let media = FakeMedia::scaled(0.5);
    let tuning = tuning();

    let targets = initial_targets(&jobs, 100_000, 0, &tuning).unwrap();
    let mut engine = ConvergenceEngine::new(&media, &media, &tuning);
    let files = engine.run("final.mp4", &jobs, targets).await.unwrap();

    assert_eq!(files, vec![jobs[0].output.clone(), jobs[1].output.clone()]);
    let history = engine.history();
    assert!(history.len() < tuning.max_attempts as usize);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].state_after, SizeState::TooSmall);
    assert_eq!(history.last().unwrap().verdict, Verdict::InWindow);
    assert!(tuning.accepts(history.last().unwrap().total_bytes));
}

#[tokio::test]
async fn test_oscillation_switches_to_bisection() {
    let dir = TempDir::new().unwrap();
    let jobs = vec![job(dir.path(), 0, 10.0)];
    let media = FakeMedia::new(Box::new(|request, attempt| {
        let kbps = request.rate.video_kbps().unwrap_or(0.0) * 0.9;
        let bytes = if attempt % 2 == 1 { 50_000 } else { 150_000 };
        Some((bytes, kbps))
    }));
    let tuning = tuning();

    let mut engine = ConvergenceEngine::new(&media, &media, &tuning);
    let result = engine.run("final.mp4", &jobs, vec![100.0]).await;
    assert!(matches!(result, Err(ReplayError::ConvergenceFailure { attempts: 10, .. })));

    let history = engine.history();
    assert_eq!(history[0].state_after, SizeState::TooSmall);
    assert_eq!(history[0].phase_after, Phase::Multiplicative);
    let second_target = history[1].targets[0];
    assert!((second_target - 100.0 / 0.9).abs() < 1e-9);

    assert_eq!(history[1].state_after, SizeState::TooBig);
    assert_eq!(history[1].phase_after, Phase::Bisection);
    assert!((history[1].next_targets[0] - (100.0 + second_target) / 2.0).abs() < 1e-9);

    // the third attempt was too small again: its target becomes the lower bound
    let third_target = history[2].targets[0];
    assert!((history[2].next_targets[0] - (third_target + second_target) / 2.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_retry_ceiling() {
    let dir = TempDir::new().unwrap();
    let jobs = vec![job(dir.path(), 0, 10.0)];
    let media = FakeMedia::new(Box::new(|request, attempt| {
        let kbps = request.rate.video_kbps().unwrap_or(0.0) * 1.05;
        Some((200_000 + attempt as u64, kbps))
    }));
    let tuning = tuning();

    let mut engine = ConvergenceEngine::new(&media, &media, &tuning);
    let result = engine.run("final.mp4", &jobs, vec![100.0]).await;

    assert!(matches!(result, Err(ReplayError::ConvergenceFailure { attempts: 10, .. })));
    assert_eq!(engine.history().len(), 10);
    assert_eq!(media.encode_requests().len(), 10);
}

#[tokio::test]
async fn test_stuck_size_fails() {
    let dir = TempDir::new().unwrap();
    let jobs = vec![job(dir.path(), 0, 10.0)];
    let media = FakeMedia::new(Box::new(|request, _| Some((200_000, request.rate.video_kbps().unwrap_or(0.0) * 1.1))));
    let tuning = tuning();

    let mut engine = ConvergenceEngine::new(&media, &media, &tuning);
    let result = engine.run("final.mp4", &jobs, vec![100.0]).await;
    assert!(matches!(result, Err(ReplayError::ConvergenceFailure { attempts: 2, .. })));
}

#[tokio::test]
async fn test_huge_overshoot_aborts() {
    let dir = TempDir::new().unwrap();
    let jobs = vec![job(dir.path(), 0, 10.0)];
    let media = FakeMedia::scaled(20.0);
    let tuning = tuning();

    let mut engine = ConvergenceEngine::new(&media, &media, &tuning);
    let result = engine.run("final.mp4", &jobs, vec![100.0]).await;
    assert!(matches!(result, Err(ReplayError::ConvergenceFailure { attempts: 1, .. })));
}

#[tokio::test]
async fn test_missing_output_is_encode_failure() {
    let dir = TempDir::new().unwrap();
    let jobs = vec![job(dir.path(), 0, 10.0)];
    let media = FakeMedia::new(Box::new(|_, _| None));
    let tuning = tuning();

    let mut engine = ConvergenceEngine::new(&media, &media, &tuning);
    let result = engine.run("final.mp4", &jobs, vec![100.0]).await;
    assert!(matches!(result, Err(ReplayError::EncodeFailure { .. })));
}

#[tokio::test]
async fn test_silent_retry_does_not_reuse_earlier_segment() {
    let dir = TempDir::new().unwrap();
    let jobs = vec![job(dir.path(), 0, 10.0)];
    let media = FakeMedia::new(Box::new(|_, attempt| if attempt == 1 { Some((50_000, 40.0)) } else { None }));
    let tuning = tuning();

    let mut engine = ConvergenceEngine::new(&media, &media, &tuning);
    let result = engine.run("final.mp4", &jobs, vec![100.0]).await;

    assert!(matches!(result, Err(ReplayError::EncodeFailure { .. })));
    assert_eq!(engine.history().len(), 1);
    assert!(!jobs[0].output.exists());
}

#[tokio::test]
async fn test_two_pass_requests() {
    let dir = TempDir::new().unwrap();
    let jobs = vec![job(dir.path(), 0, 10.0)];
    let media = FakeMedia::new(Box::new(|request, _| {
        let kbps = request.rate.video_kbps().unwrap_or(0.0);
        Some((100_000, kbps))
    }));
    let tuning = tuning();

    let mut engine = ConvergenceEngine::new(&media, &media, &tuning).with_two_pass(true);
    engine.run("final.mp4", &jobs, vec![80.0]).await.unwrap();

    let requests = media.encode_requests();
    assert_eq!(requests.len(), 2);
    assert!(matches!(requests[0].rate, RateControl::FirstPass { .. }));
    assert_eq!(requests[0].fragments, vec!["-c:v libx264".to_string(), "-preset fast".to_string()]);
    assert!(matches!(requests[1].rate, RateControl::SecondPass { .. }));
    assert_eq!(requests[1].fragments, vec!["-c:v libx264".to_string(), "-preset slow".to_string()]);
    assert_eq!(requests[1].size_ceiling, Some(105_000));
}

// Raw encoder tests

#[tokio::test]
async fn test_raw_encodes_each_segment_once() {
    let dir = TempDir::new().unwrap();
    let jobs = vec![job(dir.path(), 0, 10.0), job(dir.path(), 1, 5.0)];
    let media = FakeMedia::new(Box::new(|request, _| Some((bytes_for(500.0, request), 500.0))));

    let files = RawEncoder::new(&media).run("final.mp4", &jobs).await.unwrap();
    assert_eq!(files.len(), 2);

    let requests = media.encode_requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.rate == RateControl::Unconstrained));
    assert!(requests.iter().all(|r| r.size_ceiling.is_none()));
}

#[tokio::test]
async fn test_raw_ignores_leftover_segment() {
    let dir = TempDir::new().unwrap();
    let jobs = vec![job(dir.path(), 0, 10.0)];
    std::fs::write(&jobs[0].output, vec![0u8; 4096]).unwrap();
    let media = FakeMedia::new(Box::new(|_, _| None));

    let result = RawEncoder::new(&media).run("final.mp4", &jobs).await;
    assert!(matches!(result, Err(ReplayError::EncodeFailure { .. })));
}
