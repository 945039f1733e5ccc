//! sewing CLI - runs the `?-` queries of a program file.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use log::error;

use sewing::{
    parse, EngineConfig, Generalizer, Program, ProverConfig, SewingProver, Term,
};

fn print_usage() {
    eprintln!("sewing - trampoline-compiled resolution prover");
    eprintln!();
    eprintln!("Usage: sewing [options] <program.pl>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --tokens          Print tokens and exit");
    eprintln!("  --rules           Print parsed rules and queries and exit");
    eprintln!("  --trace           Log every predicate activation");
    eprintln!("  --no-index        Disable first-argument indexing");
    eprintln!("  --step-limit <N>  Abandon a query after N steps");
    eprintln!("  -h, --help        Show this help");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  sewing family.pl                  Run the queries in family.pl");
    eprintln!("  sewing --trace --step-limit 10000 loop.pl");
}

fn print_rules(program: &Program) {
    println!("=== Rules ===");
    for rule in program.rules.rules() {
        println!("{}", rule);
    }

    if !program.queries.is_empty() {
        println!("\n=== Queries ===");
        for query in &program.queries {
            println!("?- {}.", query);
        }
    }
}

fn print_tokens(input: &str) {
    let mut lexer = sewing::Lexer::new(input);
    println!("=== Tokens ===");
    loop {
        match lexer.next_token() {
            Ok(token) => {
                println!("{:?}", token);
                if token == sewing::Token::Eof {
                    break;
                }
            }
            Err(e) => {
                eprintln!("{}", e);
                break;
            }
        }
    }
}

/// Proves one query and prints each solution's bindings, or yes/no.
fn run_query(prover: &SewingProver, query: &Term, config: &ProverConfig) -> sewing::Result<()> {
    let mut generalizer = Generalizer::new();
    let goal = generalizer.generalize(query);
    let variables: Vec<(String, Term)> = generalizer
        .variables()
        .map(|(name, reference)| (name.name().to_string(), Term::Reference(reference.clone())))
        .collect();

    let compiled = prover.compile(&goal)?;
    if variables.is_empty() {
        let found = compiled.prove(config)?;
        println!("{}", if found { "yes" } else { "no" });
        return Ok(());
    }

    let template = Term::list(variables.iter().map(|(_, t)| t.clone()).collect());
    let solutions = compiled.solve_all(config, &template)?;
    for solution in &solutions {
        let (values, _) = solution.list_items();
        let bindings: Vec<String> = variables
            .iter()
            .zip(values)
            .map(|((name, _), value)| format!("{} = {}", name, value))
            .collect();
        println!("{}", bindings.join(", "));
    }
    println!("{}", if solutions.is_empty() { "no" } else { "yes" });
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let mut input_file: Option<PathBuf> = None;
    let mut print_tokens_flag = false;
    let mut print_rules_flag = false;
    let mut engine_config = EngineConfig::default();
    let mut prover_config = ProverConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                return ExitCode::SUCCESS;
            }
            "--tokens" => {
                print_tokens_flag = true;
            }
            "--rules" => {
                print_rules_flag = true;
            }
            "--trace" => {
                engine_config.trace = true;
            }
            "--no-index" => {
                engine_config.indexing = false;
            }
            "--step-limit" => {
                i += 1;
                match args.get(i).and_then(|n| n.parse().ok()) {
                    Some(limit) => prover_config.step_limit = Some(limit),
                    None => {
                        eprintln!("Error: --step-limit requires a number");
                        return ExitCode::from(1);
                    }
                }
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown option: {}", arg);
                return ExitCode::from(1);
            }
            _ => {
                input_file = Some(PathBuf::from(&args[i]));
            }
        }
        i += 1;
    }

    let level = if engine_config.trace { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let input_file = match input_file {
        Some(f) => f,
        None => {
            eprintln!("Error: No input file specified");
            print_usage();
            return ExitCode::from(1);
        }
    };

    let input = match fs::read_to_string(&input_file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", input_file.display(), e);
            return ExitCode::from(1);
        }
    };

    if print_tokens_flag {
        print_tokens(&input);
        return ExitCode::SUCCESS;
    }

    let program = match parse(&input) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(1);
        }
    };

    if print_rules_flag {
        print_rules(&program);
        return ExitCode::SUCCESS;
    }

    let prover = match SewingProver::builder(&program.rules)
        .config(engine_config)
        .build()
    {
        Ok(prover) => prover,
        Err(e) => {
            eprintln!("Compile error: {}", e);
            return ExitCode::from(1);
        }
    };

    let mut status = ExitCode::SUCCESS;
    for query in &program.queries {
        println!("?- {}.", query);
        if let Err(e) = run_query(&prover, query, &prover_config) {
            error!("{}", e);
            eprintln!("Error: {}", e);
            status = ExitCode::from(1);
        }
    }
    status
}
