use edlock::admin;
use edlock::config::EdlockConfig;
use edlock::entity::EntityKey;
use std::path::PathBuf;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        return Err("missing command".into());
    }
    match args[1].as_str() {
        "locks" => match args.get(2).map(String::as_str) {
            Some("list") => cmd_locks_list(&args[3..]),
            Some("clear") => cmd_locks_clear(&args[3..]),
            Some(other) => Err(format!("unknown locks command: {other}")),
            None => Err("missing locks subcommand".into()),
        },
        other => {
            print_usage();
            Err(format!("unknown top-level command: {other}"))
        }
    }
}

fn cmd_locks_list(args: &[String]) -> Result<(), String> {
    let dir = parse_lock_dir(args)?;
    let config = parse_table_config(args);

    let report = admin::list_locks(&dir, &config).map_err(|e| format!("list locks: {e}"))?;
    for entry in report.entries {
        println!(
            "{}\t{}\t{}\t{}",
            entry.target, entry.owner, entry.session_id, entry.created_at_micros
        );
    }
    Ok(())
}

fn cmd_locks_clear(args: &[String]) -> Result<(), String> {
    let dir = parse_lock_dir(args)?;
    let config = parse_table_config(args);

    let target = parse_flag_value(args, "--target");
    let owner = parse_flag_value(args, "--owner");
    let all = args.iter().any(|a| a == "--all");

    let report = match (target, owner, all) {
        (Some(raw), None, false) => {
            let target = EntityKey::parse(&raw)
                .ok_or_else(|| format!("invalid --target '{raw}', expected <type>:<key>"))?;
            admin::clear_target(&dir, &config, &target)
        }
        (None, Some(owner), false) => admin::clear_owner(&dir, &config, &owner),
        (None, None, true) => admin::clear_all(&dir, &config),
        _ => return Err("pass exactly one of --target, --owner or --all".into()),
    }
    .map_err(|e| format!("clear locks: {e}"))?;

    println!("removed\t{}", report.removed);
    Ok(())
}

fn parse_lock_dir(args: &[String]) -> Result<PathBuf, String> {
    parse_flag_value(args, "--dir")
        .map(PathBuf::from)
        .ok_or_else(|| "--dir is required".into())
}

fn parse_table_config(args: &[String]) -> EdlockConfig {
    let mut config = EdlockConfig::default();
    if let Some(table_file) = parse_flag_value(args, "--table-file") {
        config.table_file = table_file;
    }
    config
}

fn parse_flag_value(args: &[String], flag: &str) -> Option<String> {
    for idx in 0..args.len() {
        if args[idx] == flag {
            return args.get(idx + 1).cloned();
        }
    }
    None
}

fn print_usage() {
    eprintln!("usage:");
    eprintln!("  edlock locks list --dir <lock-dir> [--table-file <name>]");
    eprintln!(
        "  edlock locks clear --dir <lock-dir> (--target <type>:<key> | --owner <owner> | --all) [--table-file <name>]"
    );
}
