//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open a database and list the records one requester may read.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `labbook_cli <db-path> <experiments|items> <user-id> <team-id> [record-id] [--admin]`

use labbook_core::db::open_db;
use labbook_core::{
    core_version, parse_entity_id, Access, EntityContext, EntityResult, Requester,
    SqliteRecordStore, SqliteTeamGroups,
};
use std::process::ExitCode;

struct Args {
    db_path: String,
    kind: String,
    requester: Requester,
    record_id: Option<String>,
}

fn main() -> ExitCode {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    if raw.first().map(String::as_str) == Some("--version") {
        println!("labbook_core version={}", core_version());
        return ExitCode::SUCCESS;
    }

    let args = match parse_args(raw) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            eprintln!(
                "usage: labbook_cli <db-path> <experiments|items> <user-id> <team-id> [record-id] [--admin]"
            );
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is_hidden_at_boundary() => {
            eprintln!("nothing to show");
            ExitCode::from(1)
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn parse_args(raw: Vec<String>) -> Result<Args, String> {
    let is_admin = raw.iter().any(|arg| arg == "--admin");
    let positional: Vec<String> = raw.into_iter().filter(|arg| arg != "--admin").collect();
    if !(4..=5).contains(&positional.len()) {
        return Err(format!("expected 4 or 5 arguments, got {}", positional.len()));
    }

    let user_id = parse_entity_id(&positional[2]).map_err(|err| err.to_string())?;
    let team = parse_entity_id(&positional[3]).map_err(|err| err.to_string())?;
    Ok(Args {
        db_path: positional[0].clone(),
        kind: positional[1].clone(),
        requester: Requester {
            user_id,
            team,
            is_admin,
        },
        record_id: positional.get(4).cloned(),
    })
}

fn run(args: &Args) -> EntityResult<()> {
    let conn = open_db(&args.db_path)?;
    let store = SqliteRecordStore::new(&conn);
    let groups = SqliteTeamGroups::new(&conn);
    let mut context = EntityContext::from_type_name(&store, &args.kind, args.requester)?;
    let kind = context.kind();

    if let Some(raw_id) = args.record_id.as_deref() {
        context.set_id_str(raw_id)?;
        context.require(Access::Read, &groups)?;
        let permissions = context.permissions(&groups)?;
        let record = context.get_record()?;
        println!(
            "{} #{} title={} read={} write={}",
            kind,
            record.id()?,
            record.text("title")?.unwrap_or(""),
            permissions.read,
            permissions.write
        );
        return Ok(());
    }

    for record in context.read_all()? {
        let permissions = context.permissions_for(&record, &groups)?;
        if !permissions.read {
            continue;
        }
        println!(
            "{} #{} title={} write={}",
            kind,
            record.id()?,
            record.text("title")?.unwrap_or(""),
            permissions.write
        );
    }
    Ok(())
}
