mod common;

use common::{MockDriver, Outcome, server_error, status, template, users};
use sproc_middleware::prelude::*;

#[tokio::test]
async fn read_row_fills_requested_columns_from_first_row() -> Result<(), SqlProcError> {
    let driver = MockDriver::new();
    driver.push(Outcome::Rows(users(&[(7, "Ada"), (8, "Grace")]), None));

    let mut exec = ProcedureExecutor::new(driver.clone());
    exec.bind("Id", 7, SqlType::Numeric)?;
    let row = exec.read_row("sp_GetUser", template(&["Id", "name"])).await?;

    assert_eq!(row.len(), 2);
    assert_eq!(row["Id"], RowValues::Int(7));
    assert_eq!(row["name"], RowValues::Text("Ada".into()));
    assert_eq!(driver.calls()[0].kind, "reader");
    assert_eq!(driver.state().closes, 1);
    Ok(())
}

#[tokio::test]
async fn read_row_with_no_rows_returns_template_unchanged() -> Result<(), SqlProcError> {
    let driver = MockDriver::new();
    driver.push(Outcome::Rows(users(&[]), None));

    let mut template = template(&["Id", "Name"]);
    template.insert("Name".to_string(), RowValues::Text("unknown".into()));

    let mut exec = ProcedureExecutor::new(driver);
    let row = exec.read_row("sp_GetUser", template.clone()).await?;
    assert_eq!(row, template);
    Ok(())
}

#[tokio::test]
async fn read_row_missing_column_is_an_error() {
    let driver = MockDriver::new();
    driver.push(Outcome::Rows(users(&[(1, "Ada")]), None));

    let mut exec = ProcedureExecutor::new(driver);
    let err = exec
        .read_row("sp_GetUser", template(&["Id", "Email"]))
        .await
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("sp_GetUser"));
    assert!(msg.contains("Email"));
}

#[tokio::test]
async fn read_row_list_returns_one_record_per_row() -> Result<(), SqlProcError> {
    let driver = MockDriver::new();
    driver.push(Outcome::Rows(
        users(&[(1, "Ada"), (2, "Grace"), (3, "Edsger")]),
        Some(status(3, 0)),
    ));

    let mut exec = ProcedureExecutor::new(driver.clone());
    let records = exec
        .read_row_list("sp_ListUsers", &template(&["Id", "Name", "Active"]))
        .await?;

    assert_eq!(records.len(), 3);
    for record in &records {
        assert_eq!(record.len(), 3);
        assert!(record.contains_key("Id"));
        assert!(record.contains_key("Name"));
        assert!(record.contains_key("Active"));
    }
    assert_eq!(records[2]["Name"], RowValues::Text("Edsger".into()));
    assert_eq!(exec.rows_affected(), Some(3));
    assert_eq!(exec.return_value(), Some("0"));

    // executed exactly once
    assert_eq!(driver.calls().len(), 1);
    Ok(())
}

#[tokio::test]
async fn read_row_list_with_no_rows_is_empty() -> Result<(), SqlProcError> {
    let driver = MockDriver::new();
    driver.push(Outcome::Rows(users(&[]), Some(status(0, 0))));

    let mut exec = ProcedureExecutor::new(driver);
    let records = exec.read_row_list("sp_ListUsers", &template(&["Id"])).await?;
    assert!(records.is_empty());
    Ok(())
}

#[tokio::test]
async fn read_errors_are_wrapped_even_for_constraint_violations() {
    let driver = MockDriver::new();
    driver.push(Outcome::Fail(server_error(547, "REFERENCE constraint conflict")));

    let mut exec = ProcedureExecutor::new(driver);
    exec.bind("Id", 1, SqlType::Numeric).unwrap();
    let err = exec
        .read_row_list("sp_ListUsers", &template(&["Id"]))
        .await
        .unwrap_err();
    assert!(matches!(err, SqlProcError::Procedure { .. }));
    assert!(err.to_string().contains("REFERENCE constraint conflict"));
    assert!(exec.pending_parameters().is_empty());
    assert_eq!(exec.return_value(), None);
}

#[tokio::test]
async fn records_serialize_as_plain_json() -> Result<(), SqlProcError> {
    let driver = MockDriver::new();
    driver.push(Outcome::Rows(users(&[(5, "Ada")]), None));

    let mut exec = ProcedureExecutor::new(driver);
    let row = exec.read_row("sp_GetUser", template(&["Id", "Name"])).await?;
    let json = serde_json::to_value(&row).unwrap();
    assert_eq!(json, serde_json::json!({"Id": 5, "Name": "Ada"}));
    Ok(())
}
