use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;
use std::sync::Arc;

use wikimark_core::{Options, compile};
use wikimark_highlight::Theme;

fn main() {
    let mut input: Option<String> = None;
    let mut options = Options::default();
    let mut highlight = false;
    let mut theme = Theme::Light;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                return;
            }
            "--no-gfm" => options.gfm = false,
            "--no-tables" => options.tables = false,
            "--breaks" => options.breaks = true,
            "--pedantic" => options.pedantic = true,
            "--sanitize" => options.sanitize = true,
            "--smart-lists" => options.smart_lists = true,
            "--smartypants" => options.smartypants = true,
            "--silent" => options.silent = true,
            "--lang-prefix" => match args.next() {
                Some(prefix) => options.lang_prefix = prefix,
                None => {
                    eprintln!("--lang-prefix expects a value");
                    print_usage();
                    process::exit(2);
                }
            },
            "--highlight" => highlight = true,
            "--theme" => {
                theme = match args.next().as_deref() {
                    Some("light") => Theme::Light,
                    Some("dark") => Theme::Dark,
                    _ => {
                        eprintln!("--theme expects: light | dark");
                        print_usage();
                        process::exit(2);
                    }
                };
            }
            _ => {
                if input.is_none() {
                    input = Some(arg);
                } else {
                    eprintln!("unexpected argument: {}", arg);
                    print_usage();
                    process::exit(2);
                }
            }
        }
    }

    if highlight {
        options.highlight = Some(Arc::new(move |code: &str, lang: Option<&str>| {
            wikimark_highlight::highlight_with_theme(code, lang, theme)
        }));
    }

    let source = match input {
        Some(path) => fs::read_to_string(&path).unwrap_or_else(|err| {
            eprintln!("failed to read {}: {}", path, err);
            process::exit(1);
        }),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .unwrap_or_else(|err| {
                    eprintln!("failed to read stdin: {}", err);
                    process::exit(1);
                });
            buffer
        }
    };

    match compile(&source, &options) {
        Ok(html) => print!("{}", html),
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!(
        "Usage: wikimark-cli [--no-gfm] [--no-tables] [--breaks] [--pedantic] [--sanitize] \
         [--smart-lists] [--smartypants] [--silent] [--lang-prefix <prefix>] [--highlight] \
         [--theme light|dark] [input]"
    );
}
