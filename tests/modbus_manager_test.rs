use fusewatt::codec::DType;
use fusewatt::error::FusewattError;
use fusewatt::modbus::{ClientEndpoint, ModbusManager};
use std::time::Duration;

fn endpoint(name: &str) -> ClientEndpoint {
    ClientEndpoint {
        name: name.to_string(),
        host: "none".to_string(),
        port: 502,
        timeout: Duration::from_secs(1),
        reconnect_delay: Duration::from_secs(1),
    }
}

#[tokio::test]
async fn write_all_fans_out_across_every_client() {
    let mut mgr = ModbusManager::new(vec![endpoint("inv1"), endpoint("inv2"), endpoint("inv3")]);
    mgr.connect().await.unwrap();
    mgr.write_all(40149, &[0, 0], 3).await.unwrap();
}

#[tokio::test]
async fn closed_manager_rejects_further_reads_with_programmer_error() {
    let mut mgr = ModbusManager::new(vec![endpoint("inv1")]);
    mgr.connect().await.unwrap();
    mgr.close().await;

    let err = mgr.read_all(30777, DType::S32, 3, None).await.unwrap_err();
    assert!(matches!(err, FusewattError::Programmer { .. }));
}

#[tokio::test]
async fn host_literals_are_case_insensitive_dummy_selectors() {
    let mut mgr = ModbusManager::new(vec![ClientEndpoint { host: "DEBUG".to_string(), ..endpoint("inv1") }]);
    mgr.connect().await.unwrap();
    let value = mgr.read_one("inv1", 40001, DType::U16, 3, None).await.unwrap();
    assert_eq!(value.as_i64(), 12345);
}
