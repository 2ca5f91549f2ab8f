use std::io::{self, BufRead};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::cli::Invocation;
use crate::datetime::parse_due_expr;
use crate::filter::TaskFilter;
use crate::render::{Renderer, short_id};
use crate::repo::TaskRepository;
use crate::session::SessionStore;
use crate::task::{Category, Priority, Status, TaskDraft};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "list", "show", "modify", "start", "done", "delete", "sync", "register", "login",
        "logout", "whoami", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

fn requires_session(command: &str) -> bool {
    matches!(
        command,
        "add" | "list" | "show" | "modify" | "start" | "done" | "delete" | "sync"
    )
}

#[instrument(skip(session, repo, renderer, inv))]
pub fn dispatch(
    session: &mut SessionStore,
    repo: &mut TaskRepository,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let command = inv.command.as_str();

    debug!(
        command,
        filter = ?inv.filter_terms,
        args = ?inv.command_args,
        "dispatching command"
    );

    if requires_session(command) && session.current().is_none() {
        return Err(anyhow!("not logged in; run `docket login <email>` first"));
    }

    if !inv.filter_terms.is_empty() && command != "list" {
        warn!(terms = ?inv.filter_terms, "filter terms only apply to list; ignoring");
    }

    match command {
        "add" => cmd_add(repo, &inv.command_args, now),
        "list" => cmd_list(repo, renderer, &inv.filter_terms, now),
        "show" => cmd_show(repo, renderer, &inv.command_args, now),
        "modify" => cmd_modify(repo, &inv.command_args, now),
        "start" => cmd_set_status(repo, &inv.command_args, "start", Status::InProgress),
        "done" => cmd_set_status(repo, &inv.command_args, "done", Status::Done),
        "delete" => cmd_delete(repo, &inv.command_args),
        "sync" => cmd_sync(repo),
        "register" => cmd_register(session, &inv.command_args),
        "login" => cmd_login(session, &inv.command_args),
        "logout" => cmd_logout(session),
        "whoami" => cmd_whoami(session, renderer),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(repo, args, now))]
fn cmd_add(repo: &mut TaskRepository, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command add");

    let (words, mods) = parse_words_and_mods(args, now)?;
    let mut draft = TaskDraft {
        title: words.join(" "),
        description: None,
        priority: Priority::default(),
        status: Status::default(),
        category: Category::default(),
        due_date: None,
    };
    apply_mods(&mut draft, &mods);

    let task = repo.add(draft).context("failed to add task")?;
    println!("Created task {}.", short_id(&task.id));
    Ok(())
}

#[instrument(skip(repo, renderer, filter_terms, now))]
fn cmd_list(
    repo: &TaskRepository,
    renderer: &mut Renderer,
    filter_terms: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command list");

    let filter = TaskFilter::parse(filter_terms)?;
    let visible = repo.filter(&filter);

    if visible.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    renderer.print_task_table(&visible, now)?;
    Ok(())
}

#[instrument(skip(repo, renderer, args, now))]
fn cmd_show(
    repo: &TaskRepository,
    renderer: &mut Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command show");

    let id_arg = args
        .first()
        .ok_or_else(|| anyhow!("show requires a task id"))?;
    let id = resolve_id(repo, id_arg)?;
    let task = repo
        .get(&id)
        .ok_or_else(|| anyhow!("no such task: {id_arg}"))?;

    renderer.print_task_detail(task, now)?;
    Ok(())
}

#[instrument(skip(repo, args, now))]
fn cmd_modify(
    repo: &mut TaskRepository,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command modify");

    let (id_arg, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("modify requires a task id"))?;
    let id = resolve_id(repo, id_arg)?;
    let mut task = repo
        .get(&id)
        .cloned()
        .ok_or_else(|| anyhow!("no such task: {id_arg}"))?;

    let (words, mods) = parse_words_and_mods(rest, now)?;

    let mut draft = task.to_draft();
    if !words.is_empty() {
        draft.title = words.join(" ");
    }
    apply_mods(&mut draft, &mods);
    task.apply_draft(draft);

    repo.update(task).context("failed to modify task")?;
    println!("Modified task {}.", short_id(&id));
    Ok(())
}

#[instrument(skip(repo, args))]
fn cmd_set_status(
    repo: &mut TaskRepository,
    args: &[String],
    command: &str,
    status: Status,
) -> anyhow::Result<()> {
    info!(command, "command status shortcut");

    let id_arg = args
        .first()
        .ok_or_else(|| anyhow!("{command} requires a task id"))?;
    let id = resolve_id(repo, id_arg)?;
    let mut task = repo
        .get(&id)
        .cloned()
        .ok_or_else(|| anyhow!("no such task: {id_arg}"))?;

    task.status = status;
    repo.update(task)
        .with_context(|| format!("failed to {command} task"))?;

    let verb = match status {
        Status::InProgress => "Started",
        Status::Done => "Completed",
        Status::Todo => "Reset",
    };
    println!("{verb} task {}.", short_id(&id));
    Ok(())
}

#[instrument(skip(repo, args))]
fn cmd_delete(repo: &mut TaskRepository, args: &[String]) -> anyhow::Result<()> {
    info!("command delete");

    let id_arg = args
        .first()
        .ok_or_else(|| anyhow!("delete requires a task id"))?;
    let id = resolve_id(repo, id_arg)?;

    repo.delete(&id).context("failed to delete task")?;
    println!("Deleted task {}.", short_id(&id));
    Ok(())
}

#[instrument(skip(repo))]
fn cmd_sync(repo: &mut TaskRepository) -> anyhow::Result<()> {
    info!("command sync");

    repo.refresh().context("failed to refresh from backend")?;
    println!(
        "Synced {} task(s) ({} mode).",
        repo.list().len(),
        repo.mode().as_str()
    );
    Ok(())
}

#[instrument(skip(session, args))]
fn cmd_register(session: &mut SessionStore, args: &[String]) -> anyhow::Result<()> {
    info!("command register");

    let (username, email) = match args {
        [username, email] => (username.as_str(), email.as_str()),
        _ => return Err(anyhow!("usage: register <username> <email>")),
    };

    let password = read_password()?;
    let user = session
        .register(username, email, &password)
        .context("registration failed")?;

    println!("Registered {} <{}>.", user.username, user.email);
    Ok(())
}

#[instrument(skip(session, args))]
fn cmd_login(session: &mut SessionStore, args: &[String]) -> anyhow::Result<()> {
    info!("command login");

    let email = args
        .first()
        .ok_or_else(|| anyhow!("usage: login <email>"))?;

    let password = read_password()?;
    let user = session.login(email, &password).context("login failed")?;

    println!("Logged in as {} <{}>.", user.username, user.email);
    Ok(())
}

#[instrument(skip(session))]
fn cmd_logout(session: &mut SessionStore) -> anyhow::Result<()> {
    info!("command logout");

    session.logout()?;
    println!("Logged out.");
    Ok(())
}

#[instrument(skip(session, renderer))]
fn cmd_whoami(session: &SessionStore, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("command whoami");

    match session.current() {
        Some(user) => renderer.print_session(user),
        None => {
            println!("Not logged in.");
            Ok(())
        }
    }
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Implemented commands: add, list, show, modify, start, done, delete, sync, register, login, logout, whoami, help, version"
    );
    Ok(())
}

/// Resolves a user-supplied id argument to a full task id: exact match first,
/// then a unique prefix; anything else is an error.
fn resolve_id(repo: &TaskRepository, input: &str) -> anyhow::Result<String> {
    if let Some(task) = repo.get(input) {
        return Ok(task.id.clone());
    }

    let mut matches = repo
        .list()
        .iter()
        .filter(|task| task.id.starts_with(input));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no task with id {input}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("ambiguous task id: {input}"));
    }
    Ok(first.id.clone())
}

fn read_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed reading password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[derive(Debug, Clone)]
enum Mod {
    Desc(Option<String>),
    Priority(Priority),
    Status(Status),
    Category(Category),
    Due(Option<DateTime<Utc>>),
}

/// Splits free-form arguments into bare words and `key:value` modifiers.
/// Everything after a literal `--` counts as words.
#[instrument(skip(args, now))]
fn parse_words_and_mods(
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<(Vec<String>, Vec<Mod>)> {
    let mut words = Vec::new();
    let mut mods = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg, now)? {
            mods.push(one_mod);
            continue;
        }

        words.push(arg.clone());
    }

    Ok((words, mods))
}

fn parse_one_mod(tok: &str, now: DateTime<Utc>) -> anyhow::Result<Option<Mod>> {
    let (key, value) = if let Some((k, v)) = tok.split_once(':') {
        (k, v)
    } else if let Some((k, v)) = tok.split_once('=') {
        (k, v)
    } else {
        return Ok(None);
    };

    let key = key.to_ascii_lowercase();

    match key.as_str() {
        "desc" | "description" => {
            if value.is_empty() {
                Ok(Some(Mod::Desc(None)))
            } else {
                Ok(Some(Mod::Desc(Some(value.to_string()))))
            }
        }
        "pri" | "priority" => {
            let priority =
                Priority::parse(value).ok_or_else(|| anyhow!("unknown priority: {value}"))?;
            Ok(Some(Mod::Priority(priority)))
        }
        "status" => {
            let status = Status::parse(value).ok_or_else(|| anyhow!("unknown status: {value}"))?;
            Ok(Some(Mod::Status(status)))
        }
        "cat" | "category" => {
            let category =
                Category::parse(value).ok_or_else(|| anyhow!("unknown category: {value}"))?;
            Ok(Some(Mod::Category(category)))
        }
        "due" => {
            if value.is_empty() {
                Ok(Some(Mod::Due(None)))
            } else {
                Ok(Some(Mod::Due(Some(parse_due_expr(value, now)?))))
            }
        }
        _ => Ok(None),
    }
}

fn apply_mods(draft: &mut TaskDraft, mods: &[Mod]) {
    for one_mod in mods {
        match one_mod {
            Mod::Desc(value) => draft.description = value.clone(),
            Mod::Priority(priority) => draft.priority = *priority,
            Mod::Status(status) => draft.status = *status,
            Mod::Category(category) => draft.category = *category,
            Mod::Due(due) => draft.due_date = *due,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{
        Mod, expand_command_abbrev, known_command_names, parse_words_and_mods, requires_session,
    };
    use crate::task::{Priority, Status};

    #[test]
    fn task_commands_require_a_session() {
        for cmd in ["add", "list", "show", "modify", "start", "done", "delete", "sync"] {
            assert!(requires_session(cmd), "{cmd} must be gated");
        }
        for cmd in ["register", "login", "logout", "whoami", "help", "version"] {
            assert!(!requires_session(cmd), "{cmd} must stay open");
        }
    }

    #[test]
    fn abbreviations_expand_to_unique_prefixes() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("mod", &known), Some("modify"));
        assert_eq!(expand_command_abbrev("sy", &known), Some("sync"));
        assert_eq!(expand_command_abbrev("wh", &known), Some("whoami"));
        // "s" could be show, start or sync.
        assert_eq!(expand_command_abbrev("s", &known), None);
        // "l" could be list, login or logout.
        assert_eq!(expand_command_abbrev("l", &known), None);
        assert_eq!(expand_command_abbrev("lis", &known), Some("list"));
    }

    #[test]
    fn words_and_modifiers_split_apart() {
        let now = Utc.with_ymd_and_hms(2026, 8, 25, 9, 30, 0).unwrap();
        let args: Vec<String> = [
            "Pay",
            "rent",
            "priority:high",
            "status:inprogress",
            "due:+2d",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let (words, mods) = parse_words_and_mods(&args, now).unwrap();
        assert_eq!(words, vec!["Pay".to_string(), "rent".to_string()]);
        assert_eq!(mods.len(), 3);
        assert!(matches!(mods[0], Mod::Priority(Priority::High)));
        assert!(matches!(mods[1], Mod::Status(Status::InProgress)));
        match mods[2] {
            Mod::Due(Some(due)) => assert_eq!(due, now + Duration::days(2)),
            _ => panic!("expected due modifier"),
        }
    }

    #[test]
    fn literal_marker_turns_modifiers_into_words() {
        let now = Utc::now();
        let args: Vec<String> = ["--", "priority:high"].iter().map(|s| s.to_string()).collect();
        let (words, mods) = parse_words_and_mods(&args, now).unwrap();
        assert_eq!(words, vec!["priority:high".to_string()]);
        assert!(mods.is_empty());
    }

    #[test]
    fn empty_values_clear_desc_and_due() {
        let now = Utc::now();
        let args: Vec<String> = ["desc:", "due:"].iter().map(|s| s.to_string()).collect();
        let (words, mods) = parse_words_and_mods(&args, now).unwrap();
        assert!(words.is_empty());
        assert!(matches!(mods[0], Mod::Desc(None)));
        assert!(matches!(mods[1], Mod::Due(None)));
    }
}
