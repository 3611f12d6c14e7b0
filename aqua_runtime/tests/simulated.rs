use aqua_runtime::SimulatedRuntime;
use aqua_runtime::error::RtError;
use aqua_traits::ModelRuntime;
use rstest::rstest;

#[rstest]
fn encode_decode_and_infer() {
    // y0 = x0 + 2*x1 + 0.5 ; y1 = -x0 + 1.0
    let bytes = SimulatedRuntime::encode(2, 2, &[1.0, 2.0, -1.0, 0.0], &[0.5, 1.0]);
    let rt = SimulatedRuntime::from_bytes(&bytes).expect("decode");
    assert_eq!(rt.input_width(), 2);
    assert_eq!(rt.output_width(), 2);
    let y = rt.infer(&[3.0, 4.0]).expect("infer");
    assert!((y[0] - 11.5).abs() < 1e-6);
    assert!((y[1] + 2.0).abs() < 1e-6);
}

#[rstest]
fn rejects_wrong_magic() {
    let mut bytes = SimulatedRuntime::encode(2, 2, &[0.0; 4], &[0.0; 2]);
    bytes[0] = b'X';
    let err = SimulatedRuntime::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, RtError::Malformed(_)));
}

#[rstest]
fn rejects_truncated_payload() {
    let mut bytes = SimulatedRuntime::encode(4, 2, &[0.0; 8], &[0.0; 2]);
    bytes.truncate(bytes.len() - 3);
    let err = SimulatedRuntime::from_bytes(&bytes).unwrap_err();
    assert!(matches!(err, RtError::Malformed(_)));
}

#[rstest]
fn rejects_input_width_mismatch() {
    let bytes = SimulatedRuntime::encode(3, 2, &[0.0; 6], &[0.0; 2]);
    let rt = SimulatedRuntime::from_bytes(&bytes).expect("decode");
    let err = rt.infer(&[1.0, 2.0]).unwrap_err();
    assert!(err.to_string().contains("model expects 3"));
}
