use assert_matches::assert_matches;

use direct_runs::error::ReductionError;
use direct_runs::run_spec::{MAX_RUNS, RunFile, RunFileSpec};

#[test]
fn instrument_prefixed_file() {
    let spec: RunFileSpec = "MAR11001.RAW".parse().unwrap();
    assert_eq!(
        spec,
        RunFileSpec::Single(RunFile {
            path: None,
            run_number: 11001,
            ext: Some(".raw".to_string()),
        })
    );
}

#[test]
fn directory_is_kept_without_separator() {
    let spec: RunFileSpec = "/data/cycle_21/MAR11001.nxs".parse().unwrap();
    let file = &spec.files()[0];
    assert_eq!(file.path.as_deref(), Some("/data/cycle_21"));
    assert_eq!(file.run_number, 11001);
    assert_eq!(file.to_string(), "/data/cycle_21/11001.nxs");
}

#[test]
fn comma_lists_and_ranges_combine() {
    let spec: RunFileSpec = "11001, 11003:11005,MAR11010".parse().unwrap();
    assert_eq!(spec.run_numbers(), vec![11001, 11003, 11004, 11005, 11010]);
    assert_matches!(spec, RunFileSpec::Multiple(_));
}

#[test]
fn malformed_specifications_fail() {
    for text in ["", "MARI", "11005-11001", "11001.raw.gz", "a,b"] {
        assert_matches!(
            text.parse::<RunFileSpec>(),
            Err(ReductionError::InvalidValue { .. }),
            "{text}"
        );
    }
}

#[test]
fn oversized_ranges_are_rejected() {
    for text in ["1-4000000000", "1:65536", "1-40000,50001-90000"] {
        assert_matches!(
            text.parse::<RunFileSpec>(),
            Err(ReductionError::InvalidValue { .. }),
            "{text}"
        );
    }
    let spec: RunFileSpec = format!("1-{MAX_RUNS}").parse().unwrap();
    assert_eq!(spec.files().len(), MAX_RUNS);
}
