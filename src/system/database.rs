//! PostgreSQL role and database setup
//!
//! "already exists" is an accepted outcome: the desired end state holds, so
//! the step is logged and the run continues.

use gitea_deploy_common::profile::DatabaseCredentials;
use gitea_deploy_common::CommandError;

use super::runner::{CommandRunner, failed};

/// Outcome of one idempotent setup statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    Created,
    AlreadyExists,
}

/// Outcome of the whole database setup step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupReport {
    pub role: SetupOutcome,
    pub database: SetupOutcome,
}

/// Runs administrative statements through psql as the database superuser
pub struct PostgresAdmin<'a> {
    runner: &'a dyn CommandRunner,
    admin_command: Vec<String>,
    dump_command: Vec<String>,
}

/// Quote an SQL identifier
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote an SQL string literal
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl<'a> PostgresAdmin<'a> {
    pub fn new(runner: &'a dyn CommandRunner, admin_command: Vec<String>) -> Self {
        Self {
            runner,
            admin_command,
            dump_command: vec!["pg_dump".to_string()],
        }
    }

    /// pg_dump invocation used by [`PostgresAdmin::dump`]
    pub fn with_dump_command(mut self, dump_command: Vec<String>) -> Self {
        self.dump_command = dump_command;
        self
    }

    /// Create the role and the database owned by it
    pub fn setup(&self, credentials: &DatabaseCredentials) -> Result<SetupReport, CommandError> {
        let role = self.execute_idempotent(
            "role",
            &credentials.user,
            &format!(
                "CREATE ROLE {} WITH LOGIN PASSWORD {};",
                quote_ident(&credentials.user),
                quote_literal(&credentials.password)
            ),
        )?;
        let database = self.execute_idempotent(
            "database",
            &credentials.name,
            &format!(
                "CREATE DATABASE {} WITH OWNER {} TEMPLATE template0 ENCODING 'UTF8';",
                quote_ident(&credentials.name),
                quote_ident(&credentials.user)
            ),
        )?;
        Ok(SetupReport { role, database })
    }

    /// Execute a SQL script against a database (used by restore)
    pub fn execute_script(&self, database: &str, script: &str) -> Result<(), CommandError> {
        let (program, mut args) = self.command();
        args.extend(["-v", "ON_ERROR_STOP=1", "-d", database, "-q"]);
        let output = self.runner.run_with_input(program, &args, script)?;
        if output.success() {
            Ok(())
        } else {
            Err(failed(program, &args, &output))
        }
    }

    /// Plain SQL dump of a database
    pub fn dump(&self, database: &str) -> Result<String, CommandError> {
        let (program, mut args) = split(&self.dump_command, "pg_dump");
        args.extend(["--no-owner", "--clean", "--if-exists", database]);
        let output = self.runner.run(program, &args)?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(failed(program, &args, &output))
        }
    }

    /// Drop the database, disconnecting open sessions
    pub fn drop_database(&self, database: &str) -> Result<(), CommandError> {
        let (program, mut args) = self.command();
        let statement = format!(
            "DROP DATABASE IF EXISTS {} WITH (FORCE);",
            quote_ident(database)
        );
        args.extend(["-v", "ON_ERROR_STOP=1", "-c", statement.as_str()]);
        let output = self.runner.run(program, &args)?;
        if output.success() {
            tracing::info!(database, "dropped");
            Ok(())
        } else {
            Err(failed(program, &args, &output))
        }
    }

    fn command(&self) -> (&str, Vec<&str>) {
        split(&self.admin_command, "psql")
    }

    fn execute_idempotent(
        &self,
        kind: &str,
        name: &str,
        statement: &str,
    ) -> Result<SetupOutcome, CommandError> {
        // 语句经 stdin 传入，密码不出现在进程列表中
        let (program, mut args) = self.command();
        args.extend(["-v", "ON_ERROR_STOP=1", "-q"]);

        let output = self.runner.run_with_input(program, &args, statement)?;
        if output.success() {
            tracing::info!(kind, name, "created");
            return Ok(SetupOutcome::Created);
        }
        if output.stderr.contains("already exists") {
            tracing::info!(kind, name, "already exists, continuing");
            return Ok(SetupOutcome::AlreadyExists);
        }

        // 错误信息中不出现密码
        let mut err = failed(program, &args, &output);
        if let CommandError::Failed { command, .. } = &mut err {
            *command = format!("{} ({} {})", describe_admin(program), kind, name);
        }
        Err(err)
    }
}

fn split<'c>(command: &'c [String], default: &'c str) -> (&'c str, Vec<&'c str>) {
    let mut parts = command.iter().map(String::as_str);
    let program = parts.next().unwrap_or(default);
    (program, parts.collect())
}

fn describe_admin(program: &str) -> &str {
    if program == "sudo" { "psql" } else { program }
}
