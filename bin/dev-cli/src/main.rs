mod logger;

use std::{env, fmt::Display, process};

use federation_executor_config::{load_config, log::LoggingConfig, ExecutorConfig};
use federation_plan_executor::{
    execute_query_plan, validate_query_plan, ExecutionContext, QueryPlan, SubgraphExecutorMap,
    Value,
};
use tracing::info;

use crate::logger::configure_logging;

const USAGE: &str = "Usage: plan-exec-cli <print|validate|execute> <plan_path> \
                     [--variables <path>] [--config <path>]";

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("{}", USAGE);
        process::exit(1);
    }

    match args[1].as_str() {
        "print" => {
            configure_logging(&LoggingConfig::default());
            let plan = read_plan(&args[2]);
            print!("{}", plan);
        }
        "validate" => {
            configure_logging(&LoggingConfig::default());
            let plan = read_plan(&args[2]);
            match validate_query_plan(&plan) {
                Ok(()) => println!("Query plan is valid ({} fetches)", plan.fetch_count()),
                Err(err) => exit_with("Query plan is invalid", err),
            }
        }
        "execute" => {
            let config = load_config(flag_value(&args, "--config"))
                .unwrap_or_else(|err| exit_with("Failed to load configuration", err));
            configure_logging(&config.log);
            execute(&args[2], flag_value(&args, "--variables"), &config).await;
        }
        _ => {
            eprintln!("Unknown command. Available commands: print, validate, execute");
            process::exit(1);
        }
    };
}

async fn execute(plan_path: &str, variables_path: Option<String>, config: &ExecutorConfig) {
    let plan = read_plan(plan_path);
    let variables = match variables_path {
        Some(path) => sonic_rs::from_str::<Value>(&read_file(&path))
            .unwrap_or_else(|err| exit_with("Failed to parse variables", err)),
        None => Value::empty_object(),
    };
    let executors = SubgraphExecutorMap::from_config(config)
        .unwrap_or_else(|err| exit_with("Failed to create subgraph executors", err));
    info!(subgraphs = executors.len(), "subgraph executors ready");

    let ctx = ExecutionContext::new(&executors)
        .with_variables(variables)
        .with_execution_config(&config.execution);
    let response = execute_query_plan(&plan, ctx)
        .await
        .unwrap_or_else(|err| exit_with("Query plan execution failed", err));

    match sonic_rs::to_string_pretty(&response) {
        Ok(out) => println!("{}", out),
        Err(err) => exit_with("Failed to serialize response", err),
    }
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
        .cloned()
}

fn read_plan(path: &str) -> QueryPlan {
    QueryPlan::from_json_str(&read_file(path))
        .unwrap_or_else(|err| exit_with("Failed to parse query plan", err))
}

fn read_file(path: &str) -> String {
    std::fs::read_to_string(path)
        .unwrap_or_else(|err| exit_with(&format!("Unable to read \"{}\"", path), err))
}

fn exit_with<T>(context: &str, err: impl Display) -> T {
    eprintln!("{}: {}", context, err);
    process::exit(1)
}
