mod common;

use common::{FakeConnector, FakeServer, init_tracing};
use std::collections::BTreeMap;
use std::time::Duration;
use wildfly_orchestrator::cli::{CommandContext, CommandExecutor, CommandSet};
use wildfly_orchestrator::config::{ExecutionConfig, PropertyView};
use wildfly_orchestrator::error::{Error, Result};
use wildfly_orchestrator::management::ManagementSession;
use wildfly_orchestrator::server::ReadinessMonitor;

fn executor(connector: std::sync::Arc<FakeConnector>) -> CommandExecutor {
    init_tracing();
    CommandExecutor::new(connector).with_monitor(ReadinessMonitor::with_interval(Duration::from_millis(10)))
}

fn config(commands: &[&str]) -> ExecutionConfig {
    ExecutionConfig::with_commands(CommandSet::builder().commands(commands.iter().copied()).build())
}

#[tokio::test]
async fn test_empty_command_set_is_a_no_op() -> Result<()> {
    let server = FakeServer::standalone();
    let connector = FakeConnector::new(server.clone());

    // Would fail validation if it got that far
    let config = ExecutionConfig {
        offline: true,
        ..ExecutionConfig::default()
    };
    executor(connector.clone()).execute(&config).await?;

    assert_eq!(connector.opened(), 0);
    assert!(server.operations().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_sequential_commands_are_applied_in_order() -> Result<()> {
    let server = FakeServer::standalone();
    let connector = FakeConnector::new(server.clone());

    executor(connector.clone())
        .execute(&config(&[
            "/system-property=foo:add(value=bar)",
            "/system-property=foo:write-attribute(name=value, value=baz)",
        ]))
        .await?;

    assert_eq!(server.property("foo").as_deref(), Some("baz"));
    assert_eq!(
        server.writes(),
        vec![
            "/system-property=foo:add",
            "/system-property=foo:write-attribute"
        ]
    );
    assert_eq!(server.closed_sessions(), connector.opened());
    Ok(())
}

#[tokio::test]
async fn test_batch_is_all_or_nothing() {
    let server = FakeServer::standalone();
    server.set_property("existing", "1");
    let connector = FakeConnector::new(server.clone());

    let config = ExecutionConfig {
        batch: true,
        ..config(&[
            "/system-property=a:add(value=1)",
            "/system-property=b:add(value=2)",
            "/system-property=existing:add(value=3)",
        ])
    };
    let err = executor(connector.clone()).execute(&config).await.unwrap_err();

    assert!(matches!(err, Error::CommandExecution(_)));
    assert!(err.to_string().contains("rolled back"));
    assert_eq!(server.property("a"), None);
    assert_eq!(server.property("b"), None);
    assert_eq!(server.property("existing").as_deref(), Some("1"));
    assert_eq!(server.writes(), vec!["/:composite"]);
    assert_eq!(server.closed_sessions(), connector.opened());
}

#[tokio::test]
async fn test_single_failing_command_in_batch_leaves_no_change() {
    let server = FakeServer::standalone();
    let connector = FakeConnector::new(server.clone());

    let config = ExecutionConfig {
        batch: true,
        ..config(&["/system-property=missing:remove"])
    };
    let result = executor(connector).execute(&config).await;

    assert!(matches!(result, Err(Error::CommandExecution(_))));
    assert!(server.property("missing").is_none());
}

#[tokio::test]
async fn test_fail_fast_stops_at_first_failure() {
    let server = FakeServer::standalone();
    let connector = FakeConnector::new(server.clone());

    let err = executor(connector.clone())
        .execute(&config(&[
            "/system-property=c1:add(value=1)",
            "/system-property=c2:remove",
            "/system-property=c3:add(value=3)",
        ]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::CommandExecution(_)));
    assert!(err.to_string().contains("/system-property=c2:remove"));
    assert_eq!(server.property("c1").as_deref(), Some("1"));
    assert_eq!(server.property("c3"), None);
    assert_eq!(server.closed_sessions(), connector.opened());
}

#[tokio::test]
async fn test_continue_on_error_runs_remaining_commands() -> Result<()> {
    let server = FakeServer::standalone();
    let connector = FakeConnector::new(server.clone());

    let config = ExecutionConfig {
        fail_on_error: false,
        ..config(&[
            "/system-property=c1:add(value=1)",
            "/system-property=c2:remove",
            "/system-property=c3:add(value=3)",
        ])
    };
    executor(connector).execute(&config).await?;

    assert_eq!(server.property("c1").as_deref(), Some("1"));
    assert_eq!(server.property("c3").as_deref(), Some("3"));
    Ok(())
}

#[tokio::test]
async fn test_connection_errors_are_fatal_even_when_continuing() {
    let server = FakeServer::standalone();
    server.set_unreachable(true);
    let connector = FakeConnector::new(server.clone());

    let config = ExecutionConfig {
        fail_on_error: false,
        ..config(&["/system-property=c1:add(value=1)"])
    };
    let err = executor(connector.clone()).execute(&config).await.unwrap_err();

    assert!(matches!(err, Error::Connection(_)));
    assert_eq!(server.closed_sessions(), connector.opened());
}

#[tokio::test]
async fn test_unsupported_command_is_reported() {
    let server = FakeServer::standalone();
    let connector = FakeConnector::new(server.clone());

    let result = executor(connector).execute(&config(&["deploy app.war"])).await;

    assert!(matches!(result, Err(Error::CommandExecution(_))));
    assert!(server.writes().is_empty());
}

#[tokio::test]
async fn test_properties_resolve_with_later_layers_winning() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.properties");
    let second = dir.path().join("second.properties");
    std::fs::write(&first, "a=from-first\nb=from-first\nc=from-first\n").unwrap();
    std::fs::write(&second, "# comment\nb=from-second\nc=from-second\n").unwrap();

    let server = FakeServer::standalone();
    let connector = FakeConnector::new(server.clone());

    let config = ExecutionConfig {
        properties_files: vec![first, second],
        system_properties: BTreeMap::from([("c".to_string(), "from-config".to_string())]),
        ..config(&[
            "/system-property=a:add(value=${a})",
            "/system-property=b:add(value=${b})",
            "/system-property=c:add(value=${c})",
            "/system-property=d:add(value=${d:fallback})",
        ])
    };
    executor(connector).execute(&config).await?;

    assert_eq!(server.property("a").as_deref(), Some("from-first"));
    assert_eq!(server.property("b").as_deref(), Some("from-second"));
    assert_eq!(server.property("c").as_deref(), Some("from-config"));
    assert_eq!(server.property("d").as_deref(), Some("fallback"));
    Ok(())
}

#[tokio::test]
async fn test_unresolved_expressions_pass_through_unless_strict() -> Result<()> {
    let server = FakeServer::standalone();
    let connector = FakeConnector::new(server.clone());

    executor(connector.clone())
        .execute(&config(&["/system-property=lenient:add(value=\"${unknown.key}\")"]))
        .await?;
    assert_eq!(server.property("lenient").as_deref(), Some("${unknown.key}"));

    let strict = ExecutionConfig {
        resolve_expressions: true,
        ..config(&["/system-property=strict:add(value=\"${unknown.key}\")"])
    };
    let result = executor(connector).execute(&strict).await;
    assert!(matches!(result, Err(Error::CommandExecution(_))));
    assert_eq!(server.property("strict"), None);
    Ok(())
}

#[tokio::test]
async fn test_properties_do_not_leak_between_executions() -> Result<()> {
    let server = FakeServer::standalone();
    let connector = FakeConnector::new(server.clone());
    let executor = executor(connector);

    let first = ExecutionConfig {
        system_properties: BTreeMap::from([("leak.check".to_string(), "first".to_string())]),
        ..config(&["/system-property=one:add(value=${leak.check})"])
    };
    executor.execute(&first).await?;
    assert!(std::env::var("leak.check").is_err());

    executor
        .execute(&config(&["/system-property=two:add(value=\"${leak.check}\")"]))
        .await?;

    assert_eq!(server.property("one").as_deref(), Some("first"));
    assert_eq!(server.property("two").as_deref(), Some("${leak.check}"));
    Ok(())
}

#[tokio::test]
async fn test_properties_do_not_leak_after_a_failed_execution() -> Result<()> {
    let server = FakeServer::standalone();
    let connector = FakeConnector::new(server.clone());
    let executor = executor(connector.clone());

    let failing = ExecutionConfig {
        system_properties: BTreeMap::from([("leak.check".to_string(), "failed".to_string())]),
        ..config(&[
            "/system-property=missing:remove",
            "/system-property=one:add(value=${leak.check})",
        ])
    };
    let result = executor.execute(&failing).await;
    assert!(matches!(result, Err(Error::CommandExecution(_))));
    assert_eq!(server.property("one"), None);

    executor
        .execute(&config(&["/system-property=two:add(value=\"${leak.check}\")"]))
        .await?;

    assert_eq!(server.property("two").as_deref(), Some("${leak.check}"));
    assert_eq!(server.closed_sessions(), connector.opened());
    Ok(())
}

#[tokio::test]
async fn test_context_counts_skipped_failures() -> Result<()> {
    let server = FakeServer::standalone();
    let session = ManagementSession::new(server.clone());
    let properties = PropertyView::default();
    let config = ExecutionConfig {
        fail_on_error: false,
        ..config(&[
            "/system-property=x:remove",
            "/system-property=y:add(value=1)",
            "/system-property=z:remove",
        ])
    };

    let mut context = CommandContext::new(&session, &properties, &config);
    context.run(&config.commands).await?;

    assert_eq!(context.failures(), 2);
    assert_eq!(server.property("y").as_deref(), Some("1"));
    session.close().await
}

#[tokio::test]
async fn test_scripts_run_after_commands_with_batch_blocks() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("setup.cli");
    std::fs::write(
        &script,
        "# setup\n\
         /system-property=s1:add(value=1)\n\
         \n\
         batch\n\
         /system-property=s2:add(value=2)\n\
         /system-property=s3:add(value=3)\n\
         run-batch\n",
    )
    .unwrap();

    let server = FakeServer::standalone();
    let connector = FakeConnector::new(server.clone());

    let commands = CommandSet::builder()
        .command("/system-property=c1:add(value=0)")
        .script(&script)
        .build();
    executor(connector)
        .execute(&ExecutionConfig::with_commands(commands))
        .await?;

    assert_eq!(
        server.writes(),
        vec![
            "/system-property=c1:add",
            "/system-property=s1:add",
            "/:composite"
        ]
    );
    assert_eq!(server.property("s3").as_deref(), Some("3"));
    Ok(())
}

#[tokio::test]
async fn test_missing_script_is_an_io_error() {
    let server = FakeServer::standalone();
    let connector = FakeConnector::new(server);

    let commands = CommandSet::builder().script("/does/not/exist.cli").build();
    let result = executor(connector)
        .execute(&ExecutionConfig::with_commands(commands))
        .await;

    assert!(matches!(result, Err(Error::Io(_))));
}

#[tokio::test]
async fn test_reload_required_server_is_reloaded() -> Result<()> {
    let server = FakeServer::standalone();
    server.set_states(&["reload-required"]);
    let connector = FakeConnector::new(server.clone());

    executor(connector.clone())
        .execute(&config(&["/system-property=foo:add(value=bar)"]))
        .await?;

    assert_eq!(server.reloads(), 1);
    assert_eq!(server.closed_sessions(), connector.opened());
    Ok(())
}

#[tokio::test]
async fn test_reload_skipped_when_disabled() -> Result<()> {
    let server = FakeServer::standalone();
    server.set_states(&["reload-required"]);
    let connector = FakeConnector::new(server.clone());

    let config = ExecutionConfig {
        auto_reload: false,
        ..config(&["/system-property=foo:add(value=bar)"])
    };
    executor(connector).execute(&config).await?;

    assert_eq!(server.reloads(), 0);
    Ok(())
}

#[tokio::test]
async fn test_restart_required_is_only_reported() -> Result<()> {
    let server = FakeServer::standalone();
    server.set_states(&["restart-required"]);
    let connector = FakeConnector::new(server.clone());

    executor(connector)
        .execute(&config(&["/system-property=foo:add(value=bar)"]))
        .await?;

    assert_eq!(server.reloads(), 0);
    assert_eq!(server.shutdowns(), 0);
    Ok(())
}

#[tokio::test]
async fn test_domain_host_is_reloaded() -> Result<()> {
    let server = FakeServer::domain();
    server.set_states(&["reload-required"]);
    let connector = FakeConnector::new(server.clone());

    executor(connector)
        .execute(&config(&["/system-property=foo:add(value=bar)"]))
        .await?;

    assert_eq!(server.reloads(), 1);
    assert!(server.writes().contains(&"/host=primary:reload".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_offline_requires_install_location() {
    let server = FakeServer::standalone();
    let connector = FakeConnector::new(server.clone());

    let config = ExecutionConfig {
        offline: true,
        ..config(&["/system-property=foo:add(value=bar)"])
    };
    let result = executor(connector.clone()).execute(&config).await;

    assert!(matches!(result, Err(Error::Validation(_))));
    assert_eq!(connector.opened(), 0);
}

#[tokio::test]
async fn test_invalid_install_location_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let server = FakeServer::standalone();
    let connector = FakeConnector::new(server.clone());

    let config = ExecutionConfig {
        install_location: Some(dir.path().to_path_buf()),
        ..config(&["/system-property=foo:add(value=bar)"])
    };
    let err = executor(connector).execute(&config).await.unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert!(err.to_string().contains("is not a valid directory"));
    assert!(server.operations().is_empty());
}
