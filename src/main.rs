mod cli;

use clap::Parser;
use cli::{CliError, Command, CommandLine};
use minirel::{Database, DatabaseConfig};

fn main() {
    env_logger::init();

    let args = CommandLine::parse();
    if let Err(err) = run(args) {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run(args: CommandLine) -> Result<(), CliError> {
    let config = DatabaseConfig {
        buffer_pages: args.buffer_pages,
    };
    let mut db = Database::open(&args.data_dir, config)?;

    match args.command {
        Command::Create { relation, attrs } => {
            let specs = attrs
                .iter()
                .map(|a| cli::parse_attr_spec(a))
                .collect::<Result<Vec<_>, _>>()?;
            db.create_relation(&relation, &specs)?;
            println!("Created relation {}", relation);
        }
        Command::Destroy { relation } => {
            db.destroy_relation(&relation)?;
            println!("Destroyed relation {}", relation);
        }
        Command::Insert { relation, values } => {
            let values = values
                .iter()
                .map(|v| cli::parse_attr_value(v))
                .collect::<Result<Vec<_>, _>>()?;
            let rid = db.insert(&relation, &values)?;
            println!("Inserted record {}", rid);
        }
        Command::Select {
            result,
            projections,
            predicate,
        } => {
            let projections = projections
                .iter()
                .map(|p| cli::parse_attr_ref(p))
                .collect::<Result<Vec<_>, _>>()?;
            let source = projections
                .first()
                .map(|p| p.relation.clone())
                .unwrap_or_default();
            let predicate = predicate
                .map(|p| cli::parse_predicate(&p, &source))
                .transpose()?;
            let count = db.select(&result, &projections, predicate.as_ref())?;
            println!("Selected {} records into {}", count, result);
        }
        Command::Delete {
            relation,
            predicate,
        } => {
            let predicate = predicate
                .map(|p| cli::parse_predicate(&p, &relation))
                .transpose()?;
            let count = db.delete(&relation, predicate.as_ref())?;
            println!("Deleted {} records from {}", count, relation);
        }
        Command::Load { relation, csv } => {
            let count = db.load(&relation, &csv)?;
            println!("Loaded {} records into {}", count, relation);
        }
        Command::Print { relation } => {
            db.print_relation(&relation)?.printstd();
        }
    }

    Ok(())
}
