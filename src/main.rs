use ckb_logger::{error, info, warn};
use ckb_sdk_examples_env::{Env, HarnessConfig, KillHandle};
use ckb_sdk_examples_test::{all_examples, Example};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::env;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::Instant;

const ARG_ROOT: &str = "root";
const ARG_LIST_EXAMPLES: &str = "list-examples";
const ARG_VERBOSE: &str = "verbose";
const ARG_LOG_FILE: &str = "log-file";
const ARG_FAIL_FAST: &str = "fail-fast";
const ARG_EXAMPLES: &str = "examples";

#[derive(PartialEq, Eq, PartialOrd, Ord, Debug)]
enum TestResultStatus {
    Passed,
    Failed,
    Panicked,
}

struct TestResult {
    example_name: String,
    status: TestResultStatus,
    duration: u64,
}

fn main() {
    env::set_var("RUST_BACKTRACE", "full");

    let matches = clap_app().get_matches();
    let verbose = matches.get_flag(ARG_VERBOSE);

    let logger_guard = {
        let filter = if !verbose {
            env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
        } else {
            format!(
                "{},{}=trace,ckb_sdk_examples_env=trace",
                env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
                module_path!(),
            )
        };
        let mut logger_config = ckb_logger_config::Config {
            filter: Some(filter),
            ..Default::default()
        };
        if let Some(log_file) = matches.get_one::<PathBuf>(ARG_LOG_FILE) {
            let full_log_file = if log_file.is_relative() {
                current_dir().join(log_file)
            } else {
                log_file.clone()
            };
            logger_config.file = full_log_file
                .file_name()
                .map(|name| Path::new(name).to_path_buf())
                .unwrap_or_else(|| panic!("failed to get the filename for log_file"));
            logger_config.log_dir = full_log_file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| panic!("failed to get the parent path for log_file"));
            logger_config.log_to_file = true;
        } else {
            logger_config.log_to_file = false;
        }
        ckb_logger_service::init(None, logger_config)
            .unwrap_or_else(|err| panic!("failed to init the logger service since {}", err))
    };

    if matches.get_flag(ARG_LIST_EXAMPLES) {
        list_examples();
        return;
    }

    let exit_code = run(&matches);
    drop(logger_guard);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(matches: &ArgMatches) -> i32 {
    let names: Vec<&str> = matches
        .get_many::<String>(ARG_EXAMPLES)
        .map(|names| names.map(String::as_str).collect())
        .unwrap_or_default();
    let examples = match filter_examples(all_examples(), &names) {
        Ok(examples) => examples,
        Err(name) => {
            eprintln!("Unknown example {}", name);
            return 1;
        }
    };
    let fail_fast = matches.get_flag(ARG_FAIL_FAST);

    let root = matches
        .get_one::<PathBuf>(ARG_ROOT)
        .cloned()
        .unwrap_or_else(current_dir);
    let config = match HarnessConfig::load(&root) {
        Ok(config) => config,
        Err(err) => {
            error!("Failed to load the harness config from {}: {}", root.display(), err);
            return 1;
        }
    };
    info!("root dir: {}", config.root_dir.display());
    info!("node script: {}", config.node_script.display());
    info!("rpc url: {}", config.rpc_url);

    // the node leads its own process group and never sees the terminal's SIGINT
    let kill_handle = KillHandle::new();
    let hook_handle = kill_handle.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        hook_handle.terminate();
        std::process::exit(130);
    }) {
        warn!("Failed to set the Ctrl-C handler: {}", err);
    }

    let env = match Env::start_with_kill_handle(config, kill_handle) {
        Ok(env) => env,
        Err(err) => {
            error!("Failed to start the dev chain: {}", err);
            return 1;
        }
    };

    let start_time = Instant::now();
    let total = examples.len();
    let mut test_results = Vec::new();
    for (index, example) in examples.iter().enumerate() {
        info!("[{}] Start executing", example.name());
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| example.run(&env)));
        let seconds = started.elapsed().as_secs();
        let status = match outcome {
            Ok(Ok(())) => {
                info!(
                    "{}/{} .............. [{}] Done in {} seconds",
                    index + 1,
                    total,
                    example.name(),
                    seconds
                );
                TestResultStatus::Passed
            }
            Ok(Err(err)) => {
                error!("[{}] Error: {}", example.name(), err);
                TestResultStatus::Failed
            }
            Err(_) => {
                error!("[{}] Panic", example.name());
                TestResultStatus::Panicked
            }
        };
        let failed = status != TestResultStatus::Passed;
        test_results.push(TestResult {
            example_name: example.name().to_string(),
            status,
            duration: seconds,
        });
        if failed && fail_fast {
            break;
        }
    }
    drop(env);

    let failed: Vec<_> = test_results
        .iter()
        .filter(|result| result.status != TestResultStatus::Passed)
        .map(|result| result.example_name.clone())
        .collect();
    print_results(test_results);
    println!("Total elapsed time: {:?}", start_time.elapsed());

    if failed.is_empty() {
        0
    } else {
        error!("ckb-sdk-examples failed on {}", failed.join(", "));
        1
    }
}

fn clap_app() -> Command {
    Command::new("ckb-sdk-examples")
        .about("Runs the CKB SDK examples against a local dev chain")
        .arg(
            Arg::new(ARG_ROOT)
                .long(ARG_ROOT)
                .value_name("DIR")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Directory holding bin/ckb-node.sh, var/hashes.json and .env [default: current dir]"),
        )
        .arg(
            Arg::new(ARG_LIST_EXAMPLES)
                .long(ARG_LIST_EXAMPLES)
                .action(ArgAction::SetTrue)
                .help("Print the example names and exit"),
        )
        .arg(
            Arg::new(ARG_VERBOSE)
                .long(ARG_VERBOSE)
                .action(ArgAction::SetTrue)
                .help("Show verbose log"),
        )
        .arg(
            Arg::new(ARG_FAIL_FAST)
                .long(ARG_FAIL_FAST)
                .action(ArgAction::SetTrue)
                .help("Stop at the first failed example"),
        )
        .arg(
            Arg::new(ARG_LOG_FILE)
                .long(ARG_LOG_FILE)
                .value_name("PATH")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Write log outputs into file."),
        )
        .arg(
            Arg::new(ARG_EXAMPLES)
                .value_name("EXAMPLE")
                .num_args(0..)
                .help("Examples to run [default: all]"),
        )
}

fn filter_examples<'a>(
    mut examples: Vec<Box<dyn Example>>,
    names: &[&'a str],
) -> Result<Vec<Box<dyn Example>>, &'a str> {
    if names.is_empty() {
        return Ok(examples);
    }

    if let Some(name) = names
        .iter()
        .find(|name| !examples.iter().any(|example| example.name() == **name))
    {
        return Err(*name);
    }

    examples.retain(|example| names.contains(&example.name()));
    Ok(examples)
}

fn current_dir() -> PathBuf {
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn list_examples() {
    let mut names: Vec<_> = all_examples().iter().map(|example| example.name()).collect();
    names.sort_unstable();
    for name in names {
        println!("{}", name);
    }
}

fn print_results(mut test_results: Vec<TestResult>) {
    println!("{}", "-".repeat(20));
    println!("{:50} | {:10} | {:10}", "EXAMPLE", "STATUS", "DURATION");

    test_results.sort_by(|a, b| (&a.status, a.duration).cmp(&(&b.status, b.duration)));

    for result in test_results.iter() {
        println!(
            "{:50} | {:10} | {:<10}",
            result.example_name,
            format_args!("{:?}", result.status),
            format_args!("{} s", result.duration),
        );
    }
}
