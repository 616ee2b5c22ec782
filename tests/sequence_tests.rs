//! Call-sequence execution against the `rle` fixture library.

mod common;

use shapefuzz::types::{ApiCall, ApiCallArg, ApiSeq, CallConvention, Type};
use shapefuzz::{DefaultOracle, SequenceExecutor, Verdict, WorkerConfig};

use common::{call_log, logged, registry, CallLog, LIBRARY};

async fn executor(log: &CallLog) -> SequenceExecutor {
    let config = WorkerConfig::default();
    let oracle = Box::new(DefaultOracle::from_config(&config));
    let executor = SequenceExecutor::init(&registry(log), LIBRARY, None, config, oracle)
        .await
        .unwrap();
    log.borrow_mut().clear();
    executor
}

fn call(id: u64, name: &str, conv: CallConvention, args: Vec<ApiCallArg>) -> ApiCall {
    ApiCall {
        id,
        name: name.to_string(),
        args,
        conv,
    }
}

/// Builds a `Deflate`, feeds it a fuzzed chunk and reads the result back.
fn deflate_roundtrip(fuzz: &[u8]) -> ApiSeq {
    ApiSeq {
        fuzz: fuzz.to_vec(),
        seq: vec![
            call(
                0,
                "Deflate",
                CallConvention::Constructor,
                vec![ApiCallArg::Constant(Type::Undefined)],
            ),
            call(
                1,
                "Deflate.push",
                CallConvention::Method,
                vec![ApiCallArg::Output(0), ApiCallArg::Constant(Type::String)],
            ),
            call(2, "Deflate.result", CallConvention::Method, vec![ApiCallArg::Output(0)]),
            call(
                3,
                "util.crc32",
                CallConvention::Free,
                vec![ApiCallArg::Constant(Type::String)],
            ),
        ],
    }
}

#[tokio::test]
async fn test_same_bytes_replay_identically() {
    let log = call_log();
    let mut executor = executor(&log).await;
    let seq = deflate_roundtrip(b"\x05aaabbcc and some trailing fuzz");

    let first = executor.execute(&seq).await.unwrap();
    let first_log = logged(&log);
    assert_eq!(first, Verdict::Pass);
    assert_eq!(executor.num_executed(), 4);

    log.borrow_mut().clear();
    let second = executor.execute(&seq).await.unwrap();
    assert_eq!(second, Verdict::Pass);
    assert_eq!(executor.num_executed(), 4);
    assert_eq!(logged(&log), first_log);

    assert_eq!(first_log.len(), 4);
    assert_eq!(first_log[0], "Deflate");
    assert!(first_log[2].starts_with("Deflate.result="));
    assert_eq!(first_log[3], "util.crc32");
}

#[tokio::test]
async fn test_exception_stops_the_sequence() {
    let log = call_log();
    let mut executor = executor(&log).await;

    // With no fuzz bytes every string is empty and every number is zero.
    let seq = ApiSeq {
        fuzz: Vec::new(),
        seq: vec![
            call(
                0,
                "compress",
                CallConvention::Free,
                vec![
                    ApiCallArg::Constant(Type::String),
                    ApiCallArg::Constant(Type::Number),
                ],
            ),
            call(1, "decompress", CallConvention::Free, vec![ApiCallArg::Output(0)]),
            // A string is not a Deflate instance.
            call(2, "Deflate.result", CallConvention::Method, vec![ApiCallArg::Output(1)]),
            call(3, "decompress", CallConvention::Free, vec![ApiCallArg::Output(1)]),
        ],
    };

    let verdict = executor.execute(&seq).await.unwrap();
    assert_eq!(verdict, Verdict::Benign);
    assert_eq!(executor.num_executed(), 2);
    assert_eq!(logged(&log), vec!["compress", "decompress"]);
}

#[tokio::test]
async fn test_malformed_sequences_are_errors() {
    let log = call_log();
    let mut executor = executor(&log).await;

    let forward = ApiSeq {
        fuzz: Vec::new(),
        seq: vec![call(0, "decompress", CallConvention::Free, vec![ApiCallArg::Output(1)])],
    };
    assert!(executor.execute(&forward).await.is_err());

    let missing = ApiSeq {
        fuzz: Vec::new(),
        seq: vec![call(0, "decompress", CallConvention::Free, vec![ApiCallArg::Missing])],
    };
    assert!(executor.execute(&missing).await.is_err());

    let duplicate = ApiSeq {
        fuzz: Vec::new(),
        seq: vec![
            call(0, "util.crc32", CallConvention::Free, vec![ApiCallArg::Constant(Type::String)]),
            call(0, "util.crc32", CallConvention::Free, vec![ApiCallArg::Constant(Type::String)]),
        ],
    };
    let err = executor.execute(&duplicate).await.unwrap_err();
    assert!(err.to_string().contains("duplicate call id 0"));
    assert_eq!(executor.num_executed(), 1);
    assert_eq!(logged(&log), vec!["util.crc32"]);
}
