#![allow(missing_docs)]

use shared::Failure;

#[test]
fn ok_returns_value() {
    let result: Result<u32, String> = Ok(7);
    assert_eq!(result.or_log_and_panic("Should not fail"), 7);
}

#[test]
#[should_panic(expected = "Could not load config: missing")]
fn err_panics_with_message() {
    let result: Result<u32, &str> = Err("missing");
    result.or_log_and_panic("Could not load config");
}
