use clap::{Parser, Subcommand};
use invoicr::{
    batch::{generate_invoices, load_template},
    configuration::Configuration,
    error::ContextError,
    spreadsheet::read_records,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CliArguments {
    /// JSON configuration file, every option has a default when omitted.
    #[arg(short = 'c', long = "configuration", value_name = "json_file", global = true)]
    configuration_path: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one invoice per spreadsheet row into the output directory.
    Generate {
        #[arg(short = 's', long = "spreadsheet", value_name = "file_path")]
        spreadsheet_path: Option<PathBuf>,
        #[arg(short = 't', long = "template", value_name = "pdf_file")]
        template_path: Option<PathBuf>,
        #[arg(short = 'o', long = "output", value_name = "directory")]
        output_directory: Option<PathBuf>,
    },
    /// Serve the upload form and the generation endpoint over HTTP.
    Serve {
        #[arg(short = 'a', long = "address", value_name = "host:port")]
        address: Option<String>,
    },
}

fn main() {
    if let Err(error) = fallible_main() {
        log::error!("{}", error);
        eprintln!("ERROR: {}", error);
        std::process::exit(1);
    }
}

fn fallible_main() -> Result<(), ContextError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let arguments = CliArguments::parse();
    log::debug!("{:?}", arguments);

    let mut configuration = match &arguments.configuration_path {
        Some(configuration_path) => Configuration::from_path(configuration_path)?,
        None => Configuration::default(),
    };

    match arguments.command {
        Command::Generate {
            spreadsheet_path,
            template_path,
            output_directory,
        } => {
            if let Some(spreadsheet_path) = spreadsheet_path {
                configuration.spreadsheet_path = spreadsheet_path;
            }
            if let Some(template_path) = template_path {
                configuration.template_path = template_path;
            }
            if let Some(output_directory) = output_directory {
                configuration.output_directory = output_directory;
            }
            generate(&configuration)
        }
        Command::Serve { address } => {
            if let Some(address) = address {
                configuration.server.address = address;
            }
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|error| ContextError::with_error("Failed to start the runtime", &error))?
                .block_on(invoicr::server::serve(configuration.server))
        }
    }
}

fn generate(configuration: &Configuration) -> Result<(), ContextError> {
    if !configuration.template_path.exists() {
        return Err(ContextError::with_context(format!(
            "Template file {:?} not found!",
            configuration.template_path
        )));
    }
    if !configuration.spreadsheet_path.exists() {
        return Err(ContextError::with_context(format!(
            "Spreadsheet file {:?} not found!",
            configuration.spreadsheet_path
        )));
    }

    let records = read_records(&configuration.spreadsheet_path)?;
    println!("Loaded {} invoices from the spreadsheet", records.len());
    let template = load_template(&configuration.template_path)?;

    let generated_invoices = generate_invoices(
        &records,
        &template,
        &configuration.output_directory,
        |invoice| println!("Generated: {}", invoice.path.display()),
    )?;
    println!(
        "\nSuccessfully generated {} invoices in {:?}.",
        generated_invoices.len(),
        configuration.output_directory
    );

    Ok(())
}
