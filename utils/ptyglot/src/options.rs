//! Command-line option parsing.
//!
//! The surface keeps the traditional single-dash long options and the
//! `+`-prefixed negative forms, which rules out a derive-style parser;
//! a plain match loop does the job.

use std::fmt::Write as _;

// cSpell:ignore fontenc kssgr argv

/// Standalone actions that print something and exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Version,
    Help,
    List,
    ListFontenc,
    ListIconv,
    ShowFontenc(String),
    ShowIconv(String),
}

/// Everything the command line can configure.
#[derive(Debug, Default)]
pub struct Options {
    pub verbose: u32,
    pub test_only: u32,
    pub converter: bool,
    pub exit_on_child: bool,
    pub pipe_handshake: bool,
    pub fill_fontenc: bool,
    pub encoding: Option<String>,
    pub alias_file: Option<String>,
    pub child_argv0: Option<String>,
    pub input_log: Option<String>,
    pub output_log: Option<String>,

    pub out_banks: [Option<String>; 4],
    pub in_banks: [Option<String>; 4],
    pub out_gl: Option<usize>,
    pub out_gr: Option<usize>,
    pub in_gl: Option<usize>,
    pub in_gr: Option<usize>,

    pub seven_bit_input: bool,
    pub input_locking_shifts: bool,
    pub no_input_single_shifts: bool,
    pub no_input_ss_gr: bool,
    pub no_output_single_shifts: bool,
    pub no_output_locking_shifts: bool,
    pub no_output_designations: bool,
    pub output_passthrough: bool,

    pub action: Option<Action>,
    /// The child command line; empty means the user's shell.
    pub child: Vec<String>,
}

const OPTION_HELP: &[(&str, &str)] = &[
    // sorted per POSIX
    ("-V", "show version"),
    ("-alias filename", "location of the locale alias file"),
    ("-argv0 name", "set child's name"),
    ("-c", "simple converter stdin/stdout"),
    ("-encoding encoding", "use this encoding rather than current locale's encoding"),
    ("-fill-fontenc", "fill in one-one mapping in -show-fontenc report"),
    ("-g0 set", "set output G0 charset (default ASCII)"),
    ("-g1 set", "set output G1 charset"),
    ("-g2 set", "set output G2 charset"),
    ("-g3 set", "set output G3 charset"),
    ("-gl gn", "set output GL charset"),
    ("-gr gk", "set output GR charset"),
    ("-h", "show this message"),
    ("-ilog filename", "log all input to this file"),
    ("-k7", "generate 7-bit characters for input"),
    ("-kg0 set", "set input G0 charset"),
    ("-kg1 set", "set input G1 charset"),
    ("-kg2 set", "set input G2 charset"),
    ("-kg3 set", "set input G3 charset"),
    ("-kgl gn", "set input GL charset"),
    ("-kgr gk", "set input GR charset"),
    ("-kls", "generate locking shifts SI/SO"),
    ("+kss", "disable generation of single-shifts for input"),
    ("+kssgr", "use GL after single-shift"),
    ("-list", "list encodings recognized by this program"),
    ("-list-fontenc", "list available charset tables"),
    ("-list-iconv", "list provider-supported encodings"),
    ("-olog filename", "log all output to this file"),
    ("+ols", "disable locking-shifts in output"),
    ("+osl", "disable charset-selection sequences in output"),
    ("+oss", "disable single-shifts in output"),
    ("+ot", "disable interpretation of all sequences in output"),
    ("-p", "do parent/child handshake"),
    ("-show-fontenc name", "show details of a charset table"),
    ("-show-iconv name", "show a provider encoding as a table"),
    ("-t", "testing (initialize locale but no terminal)"),
    ("-v", "verbose (repeat to increase level)"),
    ("-x", "exit as soon as child dies"),
    ("--", "end of options"),
];

pub fn usage(program: &str) -> String {
    let mut out = format!("Usage: {program} [options] [ program [ args ] ]\n\nOptions:\n");
    let width = OPTION_HELP.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    for (name, what) in OPTION_HELP {
        let _ = writeln!(out, "  {name:width$}  {what}");
    }
    out
}

fn value(args: &[String], i: &mut usize, name: &str) -> Result<String, String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("{name} requires an argument"))
}

fn bank_index(arg: &str, name: &str) -> Result<usize, String> {
    let bytes = arg.as_bytes();
    if bytes.len() == 2 && bytes[0] == b'g' && (b'0'..=b'3').contains(&bytes[1]) {
        Ok(usize::from(bytes[1] - b'0'))
    } else {
        Err(format!(
            "The argument of {name} should be one of g0 through g3, not {arg}"
        ))
    }
}

pub fn parse(args: &[String]) -> Result<Options, String> {
    let mut opts = Options::default();
    let mut i = 0;

    while i < args.len() {
        let arg = args[i].as_str();
        if !arg.starts_with('-') && !arg.starts_with('+') {
            break;
        }
        match arg {
            "--" => {
                i += 1;
                break;
            }
            "-v" => opts.verbose += 1,
            "-V" => opts.action = Some(Action::Version),
            "-h" => opts.action = Some(Action::Help),
            "-list" => opts.action = Some(Action::List),
            "-list-fontenc" => opts.action = Some(Action::ListFontenc),
            "-list-iconv" => opts.action = Some(Action::ListIconv),
            "-show-fontenc" => {
                opts.action = Some(Action::ShowFontenc(value(args, &mut i, arg)?));
            }
            "-show-iconv" => {
                opts.action = Some(Action::ShowIconv(value(args, &mut i, arg)?));
            }
            "-fill-fontenc" => opts.fill_fontenc = true,
            "-t" => opts.test_only += 1,
            "-c" => opts.converter = true,
            "-x" => opts.exit_on_child = true,
            "-p" => opts.pipe_handshake = true,
            "-k7" => opts.seven_bit_input = true,
            "-kls" => opts.input_locking_shifts = true,
            "+kss" => opts.no_input_single_shifts = true,
            "+kssgr" => opts.no_input_ss_gr = true,
            "+oss" => opts.no_output_single_shifts = true,
            "+ols" => opts.no_output_locking_shifts = true,
            "+osl" => opts.no_output_designations = true,
            "+ot" => opts.output_passthrough = true,
            "-g0" | "-g1" | "-g2" | "-g3" => {
                let slot = usize::from(arg.as_bytes()[2] - b'0');
                opts.out_banks[slot] = Some(value(args, &mut i, arg)?);
            }
            "-kg0" | "-kg1" | "-kg2" | "-kg3" => {
                let slot = usize::from(arg.as_bytes()[3] - b'0');
                opts.in_banks[slot] = Some(value(args, &mut i, arg)?);
            }
            "-gl" => opts.out_gl = Some(bank_index(&value(args, &mut i, arg)?, arg)?),
            "-gr" => opts.out_gr = Some(bank_index(&value(args, &mut i, arg)?, arg)?),
            "-kgl" => opts.in_gl = Some(bank_index(&value(args, &mut i, arg)?, arg)?),
            "-kgr" => opts.in_gr = Some(bank_index(&value(args, &mut i, arg)?, arg)?),
            "-argv0" => opts.child_argv0 = Some(value(args, &mut i, arg)?),
            "-ilog" => opts.input_log = Some(value(args, &mut i, arg)?),
            "-olog" => opts.output_log = Some(value(args, &mut i, arg)?),
            "-alias" => opts.alias_file = Some(value(args, &mut i, arg)?),
            "-encoding" => opts.encoding = Some(value(args, &mut i, arg)?),
            _ => return Err(format!("Unknown option {arg}")),
        }
        i += 1;
    }

    opts.child = args[i..].to_vec();
    Ok(opts)
}
