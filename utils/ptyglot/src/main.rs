//! ptyglot - runs a child process behind a pseudo-terminal and
//! transcodes between the child's locale encoding and the terminal's
//! UTF-8, in both directions.

use options::{Action, Options};
use ptyglot_charset::{locale, registry, report, Iso2022};
use snafu::{prelude::*, Whatever};
use std::process::ExitCode;
use tracing::info;

mod alias;
mod options;
mod proxy;
mod pty;

type Result<T, E = Whatever> = std::result::Result<T, E>;

const DEFAULT_ALIAS_FILE: &str = "/usr/share/X11/locale/locale.alias";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("ptyglot");

    let opts = match options::parse(&args[1..]) {
        Ok(opts) => opts,
        Err(message) => {
            eprintln!("{message}");
            eprint!("{}", options::usage(program));
            return ExitCode::from(2);
        }
    };

    init_tracing(opts.verbose);

    if let Some(action) = &opts.action {
        return run_action(program, action, &opts);
    }

    match run(&opts) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u32) {
    use tracing_subscriber::EnvFilter;
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_action(program: &str, action: &Action, opts: &Options) -> ExitCode {
    match action {
        Action::Version => println!("{program} - {}", env!("CARGO_PKG_VERSION")),
        Action::Help => print!("{}", options::usage(program)),
        Action::List => print!("{}", report::report_charsets()),
        Action::ListFontenc => print!("{}", report::report_fontenc_charsets()),
        Action::ListIconv => print!("{}", report::report_provider_charsets()),
        Action::ShowFontenc(name) => match report::show_fontenc_charset(name, opts.fill_fontenc) {
            Some(dump) => print!("{dump}"),
            None => {
                eprintln!("Couldn't find charset {name}");
                return ExitCode::FAILURE;
            }
        },
        Action::ShowIconv(name) => match report::show_provider_charset(name, opts.fill_fontenc) {
            Some(dump) => print!("{dump}"),
            None => {
                eprintln!("Couldn't find encoding {name}");
                return ExitCode::FAILURE;
            }
        },
    }
    ExitCode::SUCCESS
}

/// The locale label to transcode for: `-encoding`, or the environment.
fn locale_label(opts: &Options) -> String {
    if let Some(encoding) = &opts.encoding {
        return encoding.clone();
    }
    for var in ["LC_ALL", "LC_CTYPE", "LANG"] {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                return value;
            }
        }
    }
    eprintln!("Couldn't get locale name -- using C");
    "C".to_string()
}

/// Resolve a locale label against the built-in table, falling back to
/// the locale alias file.
fn resolve_state(label: &str, opts: &Options) -> Option<locale::LocaleState> {
    if let Some(state) = locale::locale_state(locale::encoding_of(label)) {
        return Some(state);
    }
    let alias_file = opts.alias_file.as_deref().unwrap_or(DEFAULT_ALIAS_FILE);
    let resolved = alias::lookup(alias_file, label)?;
    info!("locale '{label}' resolved to '{resolved}'");
    locale::locale_state(locale::encoding_of(&resolved))
}

fn apply_output_options(state: &mut Iso2022, opts: &Options) {
    for (slot, name) in opts.out_banks.iter().enumerate() {
        if let Some(name) = name {
            state.set_bank(slot, registry::get_by_name(name));
        }
    }
    if let Some(slot) = opts.out_gl {
        state.set_gl(slot);
    }
    if let Some(slot) = opts.out_gr {
        state.set_gr(slot);
    }
    if opts.no_output_single_shifts {
        state.output.single_shifts = false;
    }
    if opts.no_output_locking_shifts {
        state.output.locking_shifts = false;
    }
    if opts.no_output_designations {
        state.output.designations = false;
    }
    if opts.output_passthrough {
        state.output.interpret = false;
    }
}

fn apply_input_options(state: &mut Iso2022, opts: &Options) {
    for (slot, name) in opts.in_banks.iter().enumerate() {
        if let Some(name) = name {
            state.set_bank(slot, registry::get_by_name(name));
        }
    }
    if let Some(slot) = opts.in_gl {
        state.set_gl(slot);
    }
    if let Some(slot) = opts.in_gr {
        state.set_gr(slot);
    }
    if opts.seven_bit_input {
        state.input.eight_bit = false;
    }
    if opts.input_locking_shifts {
        state.input.locking_shifts = true;
    }
    if opts.no_input_single_shifts {
        state.input.single_shifts = false;
    }
    if opts.no_input_ss_gr {
        state.input.ss_gr = false;
    }
}

fn run(opts: &Options) -> Result<u8> {
    let label = locale_label(opts);
    let Some(resolved) = resolve_state(&label, opts) else {
        whatever!("couldn't find an encoding for locale '{label}'; try -list");
    };

    let mut output = Iso2022::from_locale(&resolved);
    apply_output_options(&mut output, opts);

    let mut input = Iso2022::new();
    input.merge_from(&output);
    apply_input_options(&mut input, opts);

    info!("{}", output.describe("Output"));
    info!("{}", input.describe("Input"));

    if opts.test_only > 0 {
        return Ok(0);
    }

    let code = if opts.converter {
        proxy::convert(&mut output)?
    } else {
        proxy::run(opts, &mut input, &mut output)?
    };
    Ok(code as u8)
}
