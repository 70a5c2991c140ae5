use std::{env, fs, process};

use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

use bluec::bytecode::disasm::{print_bc, print_bc_stats};
use bluec::bytecode::{CompileError, Compiler, CompilerOptions};
use bluec::frontend::lexer::Lexer;
use bluec::frontend::parse_source;
use bluec::frontend::token_dumper::TokenDumper;
use bluec::Error;

struct Flags {
    tokens_only: bool,
    no_color: bool,
    pretty: bool,
    ast: bool,
    bytecode: bool,
    stats: bool,
    no_core: bool,
    output: Option<String>,
}

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let flags = Flags {
        tokens_only: args.contains(&"--tokens".to_string()),
        no_color: args.contains(&"--no-color".to_string()),
        pretty: args.contains(&"--pretty".to_string()),
        ast: args.contains(&"--ast".to_string()),
        bytecode: args.contains(&"--bc".to_string()),
        stats: args.contains(&"--stats".to_string()),
        no_core: args.contains(&"--no-core".to_string()),
        output: args
            .iter()
            .position(|a| a == "-o")
            .and_then(|i| args.get(i + 1))
            .cloned(),
    };

    // first non-flag argument that is not the value of -o
    let filename = args
        .iter()
        .enumerate()
        .skip(1)
        .find(|(i, a)| !a.starts_with('-') && args[i - 1] != "-o")
        .map(|(_, a)| a);

    let Some(filename) = filename else {
        print_usage();
        process::exit(if args.len() == 1 { 0 } else { 1 });
    };

    let source = match fs::read_to_string(filename) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", filename, e);
            process::exit(1);
        }
    };

    let result = if flags.tokens_only {
        dump_tokens(&source, &flags)
    } else {
        compile_program(&source, &flags)
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        process::exit(1);
    }
}

/// `RUST_LOG` controls the level; warnings only by default.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_usage() {
    println!("bluec - bytecode compiler for the Blue language");
    println!();
    println!("Usage:");
    println!("  bluec <file>                Compile a program");
    println!("  bluec --tokens <file>       Show tokens only (--no-color, --pretty)");
    println!("  bluec --ast <file>          Show the parsed program");
    println!("  bluec --bc <file>           Show the disassembled bytecode");
    println!("  bluec --stats <file>        Show bytecode statistics");
    println!("  bluec --no-core <file>      Skip the core prelude");
    println!("  bluec -o <out.bbc> <file>   Write the bytecode to a file");
}

fn dump_tokens(source: &str, flags: &Flags) -> Result<(), Error> {
    let tokens = Lexer::new(source).tokenize()?;

    let mut dumper = TokenDumper::new();
    if flags.no_color {
        dumper = dumper.no_color();
    }
    if flags.pretty {
        dumper = dumper.pretty();
    }
    dumper.dump(&tokens);
    Ok(())
}

fn compile_program(source: &str, flags: &Flags) -> Result<(), Error> {
    let program = parse_source(source)?;

    if flags.ast {
        println!("{:#?}", program);
        return Ok(());
    }

    let mut compiler = Compiler::with_options(CompilerOptions {
        compile_core: !flags.no_core,
    });
    if let Err(e) = compiler.compile(&program) {
        if matches!(e, CompileError::PreludeParse(_)) {
            // the embedded prelude is broken; nothing else can compile
            eprintln!("fatal: {}", e);
            process::exit(2);
        }
        return Err(e.into());
    }
    let bytecode = compiler.bytecode();
    debug!(
        bytes = bytecode.instructions.len(),
        constants = bytecode.constants.len(),
        "compiled"
    );

    if flags.bytecode {
        print_bc(&bytecode);
    }
    if flags.stats {
        print_bc_stats(&bytecode);
    }
    if let Some(path) = &flags.output {
        let bytes = bytecode.to_bytes()?;
        if let Err(e) = fs::write(path, bytes) {
            eprintln!("Failed to write '{}': {}", path, e);
            process::exit(1);
        }
    }
    Ok(())
}
