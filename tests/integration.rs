//! Integration tests for cdo-stream.
//!
//! These tests drive the processor through its public API with recording
//! handlers and check what was dispatched and how the state advanced.

use std::cell::RefCell;
use std::rc::Rc;

use cdo_stream::codec::WordCodec;
use cdo_stream::error::Result;
use cdo_stream::handler::{status, CommandHandler, CommandView, HandlerError, HandlerResult};
use cdo_stream::policy::SharedPlatform;
use cdo_stream::protocol::{build_command, ObjectHeader, CMD_END, DEFAULT_VERSION, HEADER_LEN};
use cdo_stream::state::DispatchState;
use cdo_stream::{CdoError, CdoProcessor, Chunk, ChunkStatus, ProcessorConfig, StreamState};

type Log = Rc<RefCell<Vec<(u32, Vec<u32>)>>>;

/// Records each command with its full payload once the last part arrives.
struct Recorder {
    log: Log,
    pending: Vec<u32>,
}

impl Recorder {
    fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            pending: Vec::new(),
        }
    }

    fn accept(&mut self, cmd: &CommandView<'_>) {
        self.pending.extend_from_slice(cmd.payload());
        if cmd.is_final() {
            let payload = std::mem::take(&mut self.pending);
            self.log.borrow_mut().push((cmd.cmd_id(), payload));
        }
    }
}

impl CommandHandler for Recorder {
    fn execute(&mut self, cmd: &mut CommandView<'_>) -> HandlerResult {
        self.pending.clear();
        self.accept(cmd);
        Ok(())
    }

    fn resume(&mut self, cmd: &mut CommandView<'_>) -> HandlerResult {
        self.accept(cmd);
        Ok(())
    }
}

fn object(body: &[u32]) -> Vec<u32> {
    let mut words = ObjectHeader::new(DEFAULT_VERSION, body.len() as u32)
        .encode()
        .to_vec();
    words.extend_from_slice(body);
    words
}

/// Module 1 records, module 2 breaks to its first payload word, module 3 fails.
fn processor(platform: &SharedPlatform) -> (CdoProcessor, Log) {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let processor = CdoProcessor::builder()
        .handler(1, "recorder", Recorder::new(&log))
        .handler_fn(2, "break", |cmd| {
            if let Some(&target) = cmd.payload().first() {
                cmd.request_break(target);
            }
            Ok(())
        })
        .handler_fn(3, "failing", |_| Err(HandlerError::new(0x45)))
        .platform(platform.clone())
        .build()
        .unwrap();
    (processor, log)
}

fn feed(
    processor: &mut CdoProcessor,
    state: &mut StreamState,
    words: &[u32],
    size: usize,
) -> Result<ChunkStatus> {
    let mut status = ChunkStatus::Success;
    for (i, chunk) in words.chunks(size).enumerate() {
        let next = ((i + 1) * size * 4) as u64;
        status = processor.process_chunk(state, Chunk::new(chunk, next))?;
    }
    Ok(status)
}

#[test]
fn test_header_corruption_dispatches_nothing() {
    let body = build_command(1, 1, &[1]);

    for index in 0..HEADER_LEN {
        let platform = SharedPlatform::new();
        let (mut processor, log) = processor(&platform);
        let mut words = object(&body);
        words[index] ^= 0x10;

        let mut state = StreamState::new(1);
        let err = processor
            .process_chunk(&mut state, Chunk::new(&words, 0))
            .unwrap_err();

        if index == 1 {
            assert!(matches!(err, CdoError::HeaderIdentification { .. }));
        } else {
            assert!(matches!(err, CdoError::Checksum { .. }), "word {}", index);
        }
        assert!(log.borrow().is_empty());
        assert!(state.is_first_chunk());
        assert_eq!(platform.live_status(), 1);
    }
}

#[test]
fn test_break_within_chunk() {
    let platform = SharedPlatform::new();
    let (mut processor, log) = processor(&platform);

    let mut body = build_command(1, 1, &[1]);
    body.extend(build_command(2, 1, &[8]));
    body.extend(build_command(1, 2, &[5, 5, 5]));
    body.extend(build_command(1, 3, &[7]));
    let words = object(&body);

    let mut state = StreamState::new(1);
    feed(&mut processor, &mut state, &words, words.len()).unwrap();

    assert_eq!(
        *log.borrow(),
        vec![(0x0001_0101, vec![1]), (0x0001_0103, vec![7])]
    );
    assert_eq!(state.processed_length(), 10);
    assert_eq!(state.pending_break_target(), None);
    assert!(state.is_complete());
}

#[test]
fn test_break_across_chunks() {
    let platform = SharedPlatform::new();
    let (mut processor, log) = processor(&platform);

    let mut body = build_command(2, 1, &[52]);
    body.extend(build_command(1, 2, &[0xAB; 49]));
    body.extend(build_command(1, 3, &[7]));
    let words = object(&body);

    let mut state = StreamState::new(1);
    let (first, rest) = words.split_at(HEADER_LEN + 12);
    let (second, third) = rest.split_at(20);

    processor
        .process_chunk(&mut state, Chunk::new(first, 0))
        .unwrap();
    assert!(log.borrow().is_empty());
    assert_eq!(state.processed_length(), 12);
    assert_eq!(state.pending_break_target(), Some(52));

    processor
        .process_chunk(&mut state, Chunk::new(second, 0))
        .unwrap();
    assert!(log.borrow().is_empty());
    assert_eq!(state.processed_length(), 32);
    assert_eq!(state.pending_break_target(), Some(52));

    processor
        .process_chunk(&mut state, Chunk::new(third, 0))
        .unwrap();
    assert_eq!(*log.borrow(), vec![(0x0001_0103, vec![7])]);
    assert_eq!(state.processed_length(), 54);
    assert_eq!(state.pending_break_target(), None);
}

#[test]
fn test_break_behind_processed_is_fatal() {
    let platform = SharedPlatform::new();
    platform.set_lockdown(true);
    let (mut processor, log) = processor(&platform);

    let mut body = build_command(1, 1, &[1]);
    body.extend(build_command(2, 1, &[1]));
    body.extend(build_command(1, 3, &[7]));
    let words = object(&body);

    let mut state = StreamState::new(1);
    let err = processor
        .process_chunk(&mut state, Chunk::new(&words, 0))
        .unwrap_err();

    assert!(matches!(
        err,
        CdoError::InvalidBreakLength {
            target: 1,
            processed: 4
        }
    ));
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(platform.reported_errors(), 0);
}

#[test]
fn test_break_behind_as_last_command_of_object() {
    let platform = SharedPlatform::new();
    let (mut processor, log) = processor(&platform);

    let mut body = build_command(1, 1, &[1]);
    body.extend(build_command(2, 1, &[1]));
    let words = object(&body);

    let mut state = StreamState::new(1);
    let err = processor
        .process_chunk(&mut state, Chunk::new(&words, 0))
        .unwrap_err();

    assert!(matches!(
        err,
        CdoError::InvalidBreakLength {
            target: 1,
            processed: 4
        }
    ));
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(state.pending_break_target(), None);
    assert_eq!(platform.deferred_reports(), 0);
}

#[test]
fn test_break_behind_as_last_command_of_chunk() {
    let platform = SharedPlatform::new();
    let (mut processor, log) = processor(&platform);

    let mut body = build_command(1, 1, &[1]);
    body.extend(build_command(2, 1, &[1]));
    body.extend(build_command(1, 3, &[7]));
    let words = object(&body);

    let mut state = StreamState::new(1);
    let err = processor
        .process_chunk(&mut state, Chunk::new(&words[..HEADER_LEN + 4], 0))
        .unwrap_err();

    assert!(matches!(
        err,
        CdoError::InvalidBreakLength {
            target: 1,
            processed: 4
        }
    ));
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(platform.live_status(), 1);
}

#[test]
fn test_zero_break_target_is_ignored() {
    let platform = SharedPlatform::new();
    let (mut processor, log) = processor(&platform);

    let mut body = build_command(1, 1, &[1]);
    body.extend(build_command(2, 1, &[0]));
    body.extend(build_command(1, 3, &[7]));
    let words = object(&body);

    let mut state = StreamState::new(1);
    processor
        .process_chunk(&mut state, Chunk::new(&words, 0))
        .unwrap();

    assert_eq!(log.borrow().len(), 2);
    assert_eq!(state.processed_length(), 6);
    assert!(state.is_complete());
}

#[test]
fn test_resume_advances_by_command_size() {
    let platform = SharedPlatform::new();
    let (mut processor, log) = processor(&platform);

    let payload: Vec<u32> = (0..100).collect();
    let mut body = build_command(1, 3, &payload);
    body.extend(build_command(1, 4, &[]));
    let words = object(&body);

    let mut state = StreamState::new(1);
    let mut offset = 0;
    for (len, processed) in [(HEADER_LEN + 30, 30), (40, 70), (31, 101)] {
        processor
            .process_chunk(&mut state, Chunk::new(&words[offset..offset + len], 0))
            .unwrap();
        offset += len;
        assert_eq!(state.processed_length(), processed);
        if processed < 101 {
            assert!(state.dispatch_state().is_resuming());
            assert!(log.borrow().is_empty());
        }
    }

    assert_eq!(state.dispatch_state(), DispatchState::Idle);
    assert_eq!(*log.borrow(), vec![(0x0064_0103, payload.clone())]);

    processor
        .process_chunk(&mut state, Chunk::new(&words[offset..], 0))
        .unwrap();
    assert_eq!(state.processed_length(), 102);
    assert_eq!(log.borrow()[1], (0x0000_0104, vec![]));
}

#[test]
fn test_end_is_final() {
    let platform = SharedPlatform::new();
    let (mut processor, log) = processor(&platform);

    let mut body = build_command(1, 1, &[1]);
    body.push(CMD_END);
    body.extend(build_command(1, 2, &[2]));
    let words = object(&body);

    let mut state = StreamState::new(1);
    let status = processor
        .process_chunk(&mut state, Chunk::new(&words, 0))
        .unwrap();
    assert_eq!(status, ChunkStatus::Success);
    assert!(state.end_detected());
    assert_eq!(state.processed_length(), 2);

    for garbage in [&[0x0001_0101u32, 9][..], &[0xFFFF_FFFF; 16][..]] {
        let status = processor
            .process_chunk(&mut state, Chunk::new(garbage, 0))
            .unwrap();
        assert_eq!(status, ChunkStatus::Success);
    }
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(state.processed_length(), 2);
    assert_eq!(platform.live_status(), 3);
}

#[test]
fn test_lockdown_continues_after_failure() {
    let platform = SharedPlatform::new();
    platform.set_lockdown(true);
    let (mut processor, log) = processor(&platform);

    let mut body = build_command(1, 1, &[1]);
    body.extend(build_command(3, 1, &[1, 2]));
    body.extend(build_command(1, 3, &[7]));
    let words = object(&body);

    let mut state = StreamState::new(1);
    let status = processor
        .process_chunk(&mut state, Chunk::new(&words, 0))
        .unwrap();

    assert_eq!(status, ChunkStatus::DeferredErrorPending);
    assert_eq!(
        *log.borrow(),
        vec![(0x0001_0101, vec![1]), (0x0001_0103, vec![7])]
    );
    assert_eq!(state.processed_length(), 7);
    assert!(state.deferred_error());
    assert_eq!(platform.reported_errors(), 1);
    assert_eq!(platform.last_status(), 0x45);
    assert_eq!(platform.deferred_reports(), 1);
}

#[test]
fn test_failure_aborts_without_lockdown() {
    let platform = SharedPlatform::new();
    let (mut processor, log) = processor(&platform);

    let mut body = build_command(1, 1, &[1]);
    body.extend(build_command(3, 1, &[1, 2]));
    body.extend(build_command(1, 3, &[7]));
    let words = object(&body);

    let mut state = StreamState::new(1);
    let err = processor
        .process_chunk(&mut state, Chunk::new(&words, 0))
        .unwrap_err();

    assert!(matches!(
        err,
        CdoError::HandlerFailure {
            cmd_id: 0x0002_0301,
            status: 0x45,
            offset: 28
        }
    ));
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(platform.reported_errors(), 0);
}

#[test]
fn test_live_status_updated_every_call() {
    let platform = SharedPlatform::new();
    let (mut processor, _log) = processor(&platform);

    let words = object(&build_command(1, 1, &[1, 2, 3]));
    let mut state = StreamState::new(1);
    feed(&mut processor, &mut state, &words, 3).unwrap();
    assert_eq!(platform.live_status(), 3);

    let mut bad = words.clone();
    bad[4] = 0;
    let mut state = StreamState::new(1);
    assert!(processor
        .process_chunk(&mut state, Chunk::new(&bad, 0))
        .is_err());
    assert_eq!(platform.live_status(), 4);
}

#[test]
fn test_trailing_padding_is_clamped() {
    let platform = SharedPlatform::new();
    let (mut processor, log) = processor(&platform);

    let mut words = object(&build_command(1, 1, &[1]));
    words.extend([0x00FF_0101, 0xFFFF_FFFF, 1, 2]);

    let mut state = StreamState::new(1);
    processor
        .process_chunk(&mut state, Chunk::new(&words, 0))
        .unwrap();

    assert_eq!(log.borrow().len(), 1);
    assert_eq!(state.processed_length(), 2);
    assert_eq!(state.stitched_length(), 0);
    assert_eq!(state.dispatch_state(), DispatchState::Idle);
    assert!(state.is_complete());
}

#[test]
fn test_snapshot_restore_mid_stream() {
    let payload: Vec<u32> = (0..100).map(|i| i * 3).collect();
    let mut body = build_command(1, 1, &[1]);
    body.extend(build_command(1, 3, &payload));
    body.extend(build_command(1, 4, &[4]));
    let words = object(&body);

    let platform = SharedPlatform::new();
    let (mut processor, log) = processor(&platform);
    let mut state = StreamState::new(0x1C00_0002);

    // Header, first command and three words of the second: stitched.
    let split = HEADER_LEN + 2 + 3;
    processor
        .process_chunk(&mut state, Chunk::new(&words[..split], 0x40))
        .unwrap();
    assert_eq!(state.stitched_length(), 3);

    let snapshot = state.snapshot().unwrap();
    let mut state = StreamState::restore(&snapshot).unwrap();
    assert_eq!(state.stitched_length(), 3);
    assert_eq!(state.next_chunk_address(), 0x40);

    // Mid-command this time.
    processor
        .process_chunk(&mut state, Chunk::new(&words[split..split + 40], 0))
        .unwrap();
    assert!(state.dispatch_state().is_resuming());
    let mut state = StreamState::restore(&state.snapshot().unwrap()).unwrap();

    processor
        .process_chunk(&mut state, Chunk::new(&words[split + 40..], 0))
        .unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            (0x0001_0101, vec![1]),
            (0x0064_0103, payload),
            (0x0001_0104, vec![4])
        ]
    );
    assert_eq!(state.processed_length(), body.len() as u32);
    assert_eq!(state.subsystem_id(), 0x1C00_0002);
}

#[test]
fn test_deferred_error_reported_once() {
    let platform = SharedPlatform::new();
    let mut processor = CdoProcessor::builder()
        .handler_fn(4, "soft", |cmd| {
            cmd.set_deferred_error();
            Ok(())
        })
        .platform(platform.clone())
        .build()
        .unwrap();

    let mut body = build_command(4, 1, &[]);
    body.extend(build_command(4, 2, &[1, 2]));
    let words = object(&body);

    let mut state = StreamState::new(1);
    let status = feed(&mut processor, &mut state, &words, 4).unwrap();
    assert_eq!(status, ChunkStatus::DeferredErrorPending);
    assert!(state.is_complete());
    assert_eq!(platform.deferred_reports(), 1);

    let status = processor
        .process_chunk(&mut state, Chunk::new(&[0x0000_0401], 0))
        .unwrap();
    assert_eq!(status, ChunkStatus::DeferredErrorPending);
    assert_eq!(platform.deferred_reports(), 1);
    assert_eq!(platform.reported_errors(), 0);
}

#[test]
fn test_unknown_module_fails() {
    let platform = SharedPlatform::new();
    let (mut processor, _log) = processor(&platform);

    let words = object(&build_command(9, 1, &[]));
    let mut state = StreamState::new(1);
    let err = processor
        .process_chunk(&mut state, Chunk::new(&words, 0))
        .unwrap_err();

    assert!(matches!(
        err,
        CdoError::HandlerFailure {
            cmd_id: 0x0000_0901,
            status: status::INVALID_MODULE,
            offset: 20
        }
    ));
}

#[test]
fn test_custom_end_command_from_json() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let config = ProcessorConfig::from_json(r#"{ "end_command": 767 }"#).unwrap();
    let mut processor = CdoProcessor::builder()
        .handler(1, "recorder", Recorder::new(&log))
        .config(config)
        .build()
        .unwrap();
    assert_eq!(processor.config().end_command, 0x0000_02FF);

    let mut body = build_command(1, 1, &[1]);
    body.push(0x0000_02FF);
    body.extend(build_command(1, 2, &[2]));
    let words = object(&body);

    let mut state = StreamState::new(1);
    processor
        .process_chunk(&mut state, Chunk::new(&words, 0))
        .unwrap();
    assert!(state.end_detected());
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn test_byte_chunks() {
    let platform = SharedPlatform::new();
    let (mut processor, log) = processor(&platform);

    let payload: Vec<u32> = (0..30).collect();
    let mut body = build_command(1, 1, &payload);
    body.extend(build_command(1, 2, &[5]));
    let bytes = WordCodec::encode(&object(&body));

    let mut state = StreamState::new(1);
    for (i, chunk) in bytes.chunks(12).enumerate() {
        processor
            .process_byte_chunk(&mut state, chunk, ((i + 1) * 12) as u64)
            .unwrap();
    }

    assert_eq!(
        *log.borrow(),
        vec![(0x001E_0101, payload), (0x0001_0102, vec![5])]
    );
    assert!(state.is_complete());
}
