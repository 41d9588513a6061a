#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use cmdflow_core::context;
use cmdflow_core::interceptor::{CommandInvoker, ResourceContextInterceptor, TransactionContextInterceptor};
use cmdflow_core::transaction::TransactionListener;
use cmdflow_core::{
    CommandConfig, CommandExecutor, CommandInterceptor, ExError, ExErrorKind, InterceptorChain,
    ResourceContext, ResourceContextFactory, Result, TransactionContextFactory, TransactionState,
};
use common::{
    executor, executor_with, session_factories, FakePlatformManager, Journal, RecordingSession,
    RecordingTransactionFactory,
};
use std::rc::Rc;
use std::sync::Arc;

#[test]
fn test_root_command_commits_after_flush() {
    let journal = Journal::new();
    let factory = Arc::new(RecordingTransactionFactory::new(&journal));
    let executor = executor(&journal, Some(factory.clone()));

    executor
        .execute(&|ctx: &ResourceContext| -> Result<()> {
            assert!(context::is_transaction_context_active());
            ctx.session::<RecordingSession>()?;
            Ok(())
        })
        .unwrap();

    assert_eq!(factory.opened(), 1);
    assert_eq!(journal.count("tx:commit"), 1);
    assert_eq!(journal.count("tx:rollback"), 0);
    assert!(journal.position("session:flush") < journal.position("tx:commit"));
    assert!(journal.position("tx:commit") < journal.position("session:close"));
    assert!(!context::is_transaction_context_active());
}

#[test]
fn test_failed_command_rolls_back() {
    let journal = Journal::new();
    let factory = Arc::new(RecordingTransactionFactory::new(&journal));
    let executor = executor(&journal, Some(factory.clone()));

    let err = executor
        .execute(&|_: &ResourceContext| -> Result<()> { Err(ExError::illegal_argument("rejected")) })
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::IllegalArgument);
    assert_eq!(journal.count("tx:commit"), 0);
    assert_eq!(journal.count("tx:rollback"), 1);
}

#[test]
fn test_nested_commands_never_open_second_transaction() {
    let journal = Journal::new();
    let factory = Arc::new(RecordingTransactionFactory::new(&journal));
    let executor = executor(&journal, Some(factory.clone()));

    executor
        .execute(&|outer: &ResourceContext| -> Result<()> {
            for config in [
                CommandConfig::default(),
                CommandConfig::default().transaction_requires_new(),
                CommandConfig::default().transactions_not_supported(),
            ] {
                outer
                    .command_executor()
                    .execute_with(&config, &|inner: &ResourceContext| -> Result<()> {
                        assert!(inner.is_reused());
                        assert_eq!(context::transaction_context_depth(), 1);
                        Ok(())
                    })?;
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(factory.opened(), 1);
    assert_eq!(journal.count("tx:commit"), 1);
}

#[test]
fn test_not_supported_root_runs_without_transaction() {
    let journal = Journal::new();
    let factory = Arc::new(RecordingTransactionFactory::new(&journal));
    let executor = executor(&journal, Some(factory.clone()));

    executor
        .execute_with(
            &CommandConfig::default().transactions_not_supported(),
            &|_: &ResourceContext| -> Result<()> {
                assert!(!context::is_transaction_context_active());
                Ok(())
            },
        )
        .unwrap();

    assert_eq!(factory.opened(), 0);
}

#[test]
fn test_fresh_nested_context_opens_its_own_transaction() {
    let journal = Journal::new();
    let factory = Arc::new(RecordingTransactionFactory::new(&journal));
    let executor = executor(&journal, Some(factory.clone()));

    executor
        .execute(&|outer: &ResourceContext| -> Result<()> {
            outer.command_executor().execute_with(
                &CommandConfig::default().with_new_context(),
                &|_: &ResourceContext| -> Result<()> {
                    assert_eq!(context::transaction_context_depth(), 2);
                    Ok(())
                },
            )?;
            assert_eq!(context::transaction_context_depth(), 1);
            Ok(())
        })
        .unwrap();

    assert_eq!(factory.opened(), 2);
    assert_eq!(journal.count("tx:commit"), 2);
}

#[test]
fn test_commit_failure_is_transaction_error_and_rolls_back() {
    let journal = Journal::new();
    let factory = Arc::new(RecordingTransactionFactory::failing_commit(&journal));
    let executor = executor(&journal, Some(factory));

    let err = executor
        .execute(&|ctx: &ResourceContext| -> Result<()> {
            ctx.session::<RecordingSession>()?;
            Ok(())
        })
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Transaction);
    assert_eq!(err.source_error().map(|s| s.message()), Some("commit rejected"));
    assert_eq!(journal.count("tx:rollback"), 1);
    assert_eq!(journal.count("session:close"), 1);
}

#[test]
fn test_transaction_listeners_fire_on_commit() {
    let journal = Journal::new();
    let factory = Arc::new(RecordingTransactionFactory::new(&journal));
    let executor = executor(&journal, Some(factory));

    executor
        .execute(&|_: &ResourceContext| -> Result<()> {
            let tx = context::transaction_context().unwrap();
            for state in [TransactionState::Committing, TransactionState::Committed] {
                let recorder = journal.clone();
                let listener: Rc<dyn TransactionListener> =
                    Rc::new(move |ctx: &ResourceContext| -> Result<()> {
                        assert!(!ctx.is_reused());
                        recorder.record(format!("listener:{}", state));
                        Ok(())
                    });
                tx.add_transaction_listener(state, listener);
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(
        journal.with_prefix("listener:"),
        vec!["listener:committing", "listener:committed"]
    );
    assert!(journal.position("listener:committing") < journal.position("tx:commit"));
}

#[test]
fn test_platform_required_joins_active_transaction() {
    let journal = Journal::new();
    let manager = Arc::new(FakePlatformManager::new(&journal));
    let executor = executor_with(session_factories(&journal), None, Some(manager));

    executor
        .execute(&|outer: &ResourceContext| -> Result<()> {
            outer
                .command_executor()
                .execute(&|_: &ResourceContext| -> Result<()> { Ok(()) })
        })
        .unwrap();

    assert_eq!(journal.with_prefix("platform:"), vec!["platform:begin:REQUIRED", "platform:commit"]);
}

#[test]
fn test_platform_requires_new_begins_nested_transaction() {
    let journal = Journal::new();
    let manager = Arc::new(FakePlatformManager::new(&journal));
    let executor = executor_with(session_factories(&journal), None, Some(manager));

    executor
        .execute(&|outer: &ResourceContext| -> Result<()> {
            outer.command_executor().execute_with(
                &CommandConfig::default().transaction_requires_new(),
                &|_: &ResourceContext| -> Result<()> { Ok(()) },
            )
        })
        .unwrap();

    assert_eq!(
        journal.with_prefix("platform:"),
        vec![
            "platform:begin:REQUIRED",
            "platform:begin:REQUIRES_NEW",
            "platform:commit",
            "platform:commit",
        ]
    );
}

#[test]
fn test_platform_rolls_back_on_failure() {
    let journal = Journal::new();
    let manager = Arc::new(FakePlatformManager::new(&journal));
    let executor = executor_with(session_factories(&journal), None, Some(manager));

    let err = executor
        .execute(&|_: &ResourceContext| -> Result<()> { Err(ExError::not_found("gone")) })
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::NotFound);
    assert_eq!(journal.with_prefix("platform:"), vec!["platform:begin:REQUIRED", "platform:rollback"]);
}

#[test]
fn test_refused_transaction_listener_rolls_back_and_fails() {
    let journal = Journal::new();
    let factory = Arc::new(RecordingTransactionFactory::new(&journal));
    let shared: Arc<dyn TransactionContextFactory> = factory.clone();
    let chain: Vec<Box<dyn CommandInterceptor>> = vec![
        Box::new(ResourceContextInterceptor::new(ResourceContextFactory::new(session_factories(&journal)))),
        Box::new(TransactionContextInterceptor::new(Some(shared.clone()))),
        Box::new(TransactionContextInterceptor::new(Some(shared))),
        Box::new(CommandInvoker),
    ];
    let executor = CommandExecutor::new(CommandConfig::default(), InterceptorChain::new(chain).unwrap());

    let err = executor
        .execute(&|_: &ResourceContext| -> Result<()> {
            journal.record("command:ran");
            Ok(())
        })
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::IllegalState);
    assert_eq!(factory.opened(), 2);
    assert_eq!(journal.count("command:ran"), 0);
    assert_eq!(journal.count("tx:rollback"), 2, "both transactions rolled back");
    assert_eq!(journal.count("tx:commit"), 0);
    assert!(!context::is_transaction_context_active());
}
