mod common;

use std::collections::HashMap;

use common::{MockDriver, Outcome, server_error, status};
use sproc_middleware::prelude::*;

#[tokio::test]
async fn execute_captures_rows_and_return_value() -> Result<(), SqlProcError> {
    let driver = MockDriver::new();
    driver.push(Outcome::Status(status(3, 0)));

    let mut exec = ProcedureExecutor::new(driver.clone());
    let result = exec.execute("sp_ArchiveOrders").await?;
    assert_eq!(result.rows_affected, Some(3));
    assert_eq!(result.return_value.as_deref(), Some("0"));

    let state = driver.state();
    assert_eq!(state.connects, 1);
    assert_eq!(state.closes, 1);
    Ok(())
}

#[tokio::test]
async fn constraint_violation_becomes_return_value() -> Result<(), SqlProcError> {
    let driver = MockDriver::new();
    driver.push(Outcome::Fail(server_error(
        547,
        "The DELETE statement conflicted with the REFERENCE constraint \"FK_Orders_Users\".",
    )));

    let mut exec = ProcedureExecutor::new(driver.clone());
    exec.bind("UserId", 42, SqlType::Numeric)?;
    let result = exec.execute("sp_DeleteUser").await?;
    assert_eq!(result.return_value.as_deref(), Some("547"));
    assert_eq!(result.rows_affected, Some(0));
    assert_eq!(driver.state().closes, 1);
    Ok(())
}

#[tokio::test]
async fn other_server_errors_carry_the_original_message() {
    let driver = MockDriver::new();
    driver.push(Outcome::Fail(server_error(50000, "balance may not go negative")));

    let mut exec = ProcedureExecutor::new(driver);
    let err = exec.execute("sp_Withdraw").await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("sp_Withdraw"));
    assert!(msg.contains("balance may not go negative"));
    assert_eq!(err.server_number(), Some(50000));
    assert!(matches!(err, SqlProcError::Procedure { .. }));
}

#[tokio::test]
async fn failed_execute_keeps_previous_results() -> Result<(), SqlProcError> {
    let driver = MockDriver::new();
    driver.push(Outcome::Status(status(2, 5)));
    driver.push(Outcome::Fail(server_error(208, "Invalid object name 'Missing'.")));

    let mut exec = ProcedureExecutor::new(driver);
    exec.execute("sp_First").await?;
    assert!(exec.execute("sp_Second").await.is_err());
    assert_eq!(exec.rows_affected(), Some(2));
    assert_eq!(exec.return_value(), Some("5"));
    Ok(())
}

#[tokio::test]
async fn scalar_leaves_rows_and_return_value_alone() -> Result<(), SqlProcError> {
    let driver = MockDriver::new();
    driver.push(Outcome::Status(status(4, 1)));
    driver.push(Outcome::Scalar(RowValues::Int(17)));

    let mut exec = ProcedureExecutor::new(driver.clone());
    exec.execute("sp_Seed").await?;
    exec.bind("Region", "west", SqlType::String)?;
    let result = exec.execute_scalar("sp_CountCustomers").await?;
    assert_eq!(result.scalar_value, Some(RowValues::Int(17)));
    assert_eq!(result.rows_affected, Some(4));
    assert_eq!(result.return_value.as_deref(), Some("1"));
    assert_eq!(driver.calls()[1].kind, "scalar");
    Ok(())
}

#[tokio::test]
async fn scalar_with_no_rows_is_null() -> Result<(), SqlProcError> {
    let driver = MockDriver::new();
    driver.push(Outcome::Scalar(RowValues::Null));

    let mut exec = ProcedureExecutor::new(driver);
    exec.execute_scalar("sp_FindNothing").await?;
    assert_eq!(exec.scalar_value(), Some(&RowValues::Null));
    assert_eq!(exec.rows_affected(), None);
    Ok(())
}

#[tokio::test]
async fn scalar_constraint_violation_sets_return_value() -> Result<(), SqlProcError> {
    let driver = MockDriver::new();
    driver.push(Outcome::Fail(server_error(547, "FOREIGN KEY conflict")));

    let mut exec = ProcedureExecutor::new(driver);
    let result = exec.execute_scalar("sp_InsertAndCount").await?;
    assert_eq!(result.return_value.as_deref(), Some("547"));
    assert_eq!(result.scalar_value, None);
    assert_eq!(result.rows_affected, None);
    Ok(())
}

#[tokio::test]
async fn generated_id_is_read_from_output_parameter() -> Result<(), SqlProcError> {
    let driver = MockDriver::new();
    let mut outputs = HashMap::new();
    outputs.insert("NewId".to_string(), RowValues::Int(1001));
    driver.push(Outcome::Status(ProcedureStatus {
        rows_affected: 1,
        return_value: RowValues::Int(0),
        outputs,
    }));

    let mut exec = ProcedureExecutor::new(driver.clone());
    exec.bind("Name", "Ada", SqlType::String)?
        .bind_with_direction("NewId", RowValues::Null, SqlType::Numeric, Direction::Output)?;
    let result = exec.execute_returning_id("sp_InsertUser", "@newid").await?;
    assert_eq!(result.generated_id, Some(1001));
    assert_eq!(result.rows_affected, Some(1));

    let calls = driver.calls();
    let sent = &calls[0].params[1];
    assert_eq!(sent.direction(), Direction::Output);
    Ok(())
}

#[tokio::test]
async fn missing_id_output_is_an_error() {
    let driver = MockDriver::new();
    driver.push(Outcome::Status(status(1, 0)));

    let mut exec = ProcedureExecutor::new(driver);
    let err = exec
        .execute_returning_id("sp_InsertUser", "NewId")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("NewId"));
    assert_eq!(exec.generated_id(), None);
    // the call itself succeeded, so its status is still recorded
    assert_eq!(exec.rows_affected(), Some(1));
    assert_eq!(exec.return_value(), Some("0"));
}

#[tokio::test]
async fn null_return_value_is_empty_text() -> Result<(), SqlProcError> {
    let driver = MockDriver::new();
    driver.push(Outcome::Status(ProcedureStatus {
        rows_affected: 0,
        return_value: RowValues::Null,
        outputs: HashMap::new(),
    }));

    let mut exec = ProcedureExecutor::new(driver);
    exec.execute("sp_NoReturn").await?;
    assert_eq!(exec.return_value(), Some(""));
    Ok(())
}
