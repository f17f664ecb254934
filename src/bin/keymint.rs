//! Keymint CLI — mint keys, rename files under them, trace rename lineage.
//!
//! Commands:
//!   keymint key    — assign a key to a file and compose its new name
//!   keymint mint   — mint standalone keys with no filename association
//!   keymint report — report lineage for a key pattern, or ALL edges
//!   keymint attr   — set or read per-key attributes
//!   keymint stats  — show registry counters

use std::env;
use std::path::PathBuf;
use std::process::exit;

use keymint_core::{
    AssignRequest, LineageReport, MatchMode, RegistryConfig, RegistryService,
};

fn print_usage() {
    println!(
        r#"
Keymint — collision-free short-key registry with rename lineage

Usage: keymint <command> [options]

Commands:
  key    <original-name> -prefix <p> [-ext <e>] [-key <k>] [-comment <c>]
                                       Assign (or reuse) a key, compose the new name
  mint   <count>                       Mint standalone keys
  report <key|ALL> [--json]            Ancestor chains for matching keys, or all edges
  attr   set <key> <attribute> <value> Record an attribute for a key
  attr   get <key> [--json]            List a key's attributes
  stats                                Registry counters

Shared options:
  -dir <path>      Base directory of the registry files (default ".")
  -base <name>     Base filename of the registry files (default "registry")
  -length <n>      Symbol length of generated keys (default 4)
  -exact           Match report patterns against whole keys only

Examples:
  keymint key initial_file.fa -prefix gensp.pre -ext fa
  keymint key gensp.pre.zR56.fa -prefix gensp.pre -ext fa -key zR56
  keymint mint 5 -length 6
  keymint report zR56
  keymint report ALL --json
"#
    );
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        print_usage();
        return;
    }

    let result = match args[0].as_str() {
        "key" => cmd_key(args[1..].to_vec()),
        "mint" => cmd_mint(args[1..].to_vec()),
        "report" => cmd_report(args[1..].to_vec()),
        "attr" => cmd_attr(args[1..].to_vec()),
        "stats" => cmd_stats(args[1..].to_vec()),
        "help" | "--help" | "-h" => {
            print_usage();
            return;
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            exit(2);
        }
    };

    if let Err(msg) = result {
        eprintln!("error: {}", msg);
        exit(1);
    }
}

/// Build the service from the shared options, consuming them from `args`.
fn service_from_opts(args: &mut Vec<String>) -> Result<RegistryService, String> {
    let mut config = RegistryConfig::default();
    if let Some(dir) = take_opt(args, "-dir")? {
        config.base_dir = PathBuf::from(dir);
    }
    if let Some(base) = take_opt(args, "-base")? {
        config.base_name = base;
    }
    if let Some(length) = take_opt(args, "-length")? {
        config.key_length = length
            .parse()
            .map_err(|_| format!("-length expects a number, got {:?}", length))?;
    }
    if take_flag(args, "-exact") {
        config.match_mode = MatchMode::Exact;
    }
    Ok(RegistryService::new(config))
}

fn cmd_key(mut args: Vec<String>) -> Result<(), String> {
    let svc = service_from_opts(&mut args)?;
    let prefix = take_opt(&mut args, "-prefix")?;
    let extension = take_opt(&mut args, "-ext")?;
    let key = take_opt(&mut args, "-key")?;
    let comment = take_opt(&mut args, "-comment")?;

    let (Some(prefix), [original_name]) = (prefix, args.as_slice()) else {
        return Err(
            "usage: keymint key <original-name> -prefix <p> [-ext <e>] [-key <k>] [-comment <c>]"
                .to_string(),
        );
    };

    let assigned = svc
        .assign_key(&AssignRequest {
            original_name: original_name.clone(),
            prefix,
            extension,
            key,
            comment,
        })
        .map_err(|e| e.to_string())?;

    println!("  {} -> {}", original_name, assigned.new_name);
    println!("  key: {}", assigned.key);
    Ok(())
}

fn cmd_mint(mut args: Vec<String>) -> Result<(), String> {
    let svc = service_from_opts(&mut args)?;
    let [count] = args.as_slice() else {
        return Err("usage: keymint mint <count>".to_string());
    };
    let count: usize = count
        .parse()
        .map_err(|_| format!("mint expects a count, got {:?}", count))?;

    let minted = svc.mint_simple_keys(count).map_err(|e| e.to_string())?;
    println!("  Minted {} keys:", minted.len());
    for key in &minted {
        println!("  {}", key);
    }
    Ok(())
}

fn cmd_report(mut args: Vec<String>) -> Result<(), String> {
    let json = take_flag(&mut args, "--json");
    let svc = service_from_opts(&mut args)?;
    let [query] = args.as_slice() else {
        return Err("usage: keymint report <key|ALL> [--json]".to_string());
    };

    match svc.report_lineage(query).map_err(|e| e.to_string())? {
        LineageReport::AllEdges(edges) => {
            if json {
                println!("{}", render_json(&edges)?);
                return Ok(());
            }
            println!("  Edges ({}):", edges.len());
            println!("  {}", "-".repeat(40));
            for edge in &edges {
                println!("  {} <- {}", edge.new_key, edge.old_key);
            }
        }
        LineageReport::Chains(entries) => {
            if json {
                println!("{}", render_json(&entries)?);
                return Ok(());
            }
            for entry in &entries {
                match &entry.error {
                    Some(msg) => println!("  {}: {}", entry.key, msg),
                    None => println!("  {}: {}", entry.key, entry.ancestors.join(" <- ")),
                }
            }
        }
    }
    Ok(())
}

fn cmd_attr(mut args: Vec<String>) -> Result<(), String> {
    let json = take_flag(&mut args, "--json");
    let svc = service_from_opts(&mut args)?;

    match args.first().map(String::as_str) {
        Some("set") => {
            let [_, key, attribute, value] = args.as_slice() else {
                return Err("usage: keymint attr set <key> <attribute> <value>".to_string());
            };
            svc.set_attribute(key, attribute, value)
                .map_err(|e| e.to_string())?;
            println!("  {} {}={}", key, attribute, value);
            Ok(())
        }
        Some("get") => {
            let [_, key] = args.as_slice() else {
                return Err("usage: keymint attr get <key> [--json]".to_string());
            };
            let records = svc.attributes_for(key).map_err(|e| e.to_string())?;
            if json {
                println!("{}", render_json(&records)?);
                return Ok(());
            }
            for record in &records {
                println!("  {}\t{}", record.attribute, record.value);
            }
            Ok(())
        }
        _ => Err("usage: keymint attr <set|get> ...".to_string()),
    }
}

fn cmd_stats(mut args: Vec<String>) -> Result<(), String> {
    let svc = service_from_opts(&mut args)?;
    let stats = svc.stats().map_err(|e| e.to_string())?;
    println!("  Registry statistics");
    println!("  {}", "=".repeat(40));
    println!("  Keys:        {}", stats.total_keys);
    println!("  Named keys:  {}", stats.named_keys);
    println!("  Edges:       {}", stats.total_edges);
    Ok(())
}

/// Remove `-name value` from `args`, returning the value when present.
fn take_opt(args: &mut Vec<String>, name: &str) -> Result<Option<String>, String> {
    let Some(pos) = args.iter().position(|a| a == name) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        return Err(format!("{} expects a value", name));
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(value))
}

/// Remove a bare `name` flag from `args`, returning whether it was present.
fn take_flag(args: &mut Vec<String>, name: &str) -> bool {
    match args.iter().position(|a| a == name) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn render_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| e.to_string())
}
