//! Decodes a FIX message given on the command line (in `|`-delimited form)
//! and prints its structure.
//!
//! ```text
//! cargo run --example decode -- '8=FIX.4.2|9=49|35=D|49=BANZAI|56=EXEC|11=C1|55=IBM|54=1|40=1|10=100|'
//! ```

use dynafix::prelude::*;

fn print_section(label: &str, section: &Section, indent: usize) {
    println!("{:indent$}{label}:", "");
    for entry in section.entries() {
        match entry {
            Entry::Field(field) => {
                println!(
                    "{:indent$}  {} ({}) = {}",
                    "",
                    field.name(),
                    field.tag(),
                    field.value_str()
                );
            }
            Entry::Group(group) => {
                println!("{:indent$}  {} ({}) x{}", "", group.name(), group.tag(), group.len());
                for (i, rep) in group.reps().iter().enumerate() {
                    print_section(&format!("[{i}]"), rep, indent + 4);
                }
            }
        }
    }
}

fn main() {
    env_logger::init();

    let input = std::env::args().nth(1).unwrap_or_else(|| {
        eprintln!("usage: decode '<message with | separators>'");
        std::process::exit(2);
    });

    let decoder = Decoder::new(Registry::bundled());
    match decoder.decode(input.as_bytes()) {
        Ok(message) => {
            println!(
                "{} ({})",
                message.name().unwrap_or("<generic>"),
                message.msg_type().unwrap_or_default()
            );
            print_section("header", message.header(), 0);
            print_section("body", message.body(), 0);
            print_section("trailer", message.trailer(), 0);
            println!("canonical: {}", message.to_human());
        }
        Err(error) => {
            eprintln!("decode failed: {error}");
            std::process::exit(1);
        }
    }
}
