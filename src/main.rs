use clap::{App, Arg};
use kiln::build::build_site;
use kiln::config::Config;
use log::error;
use std::error::Error;
use std::path::Path;

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .init();

    let matches = App::new("kiln")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Builds a static blog from a kiln project")
        .arg(
            Arg::with_name("project")
                .long("project")
                .short("p")
                .takes_value(true)
                .value_name("DIR")
                .default_value(".")
                .help("The project directory, or any directory beneath it"),
        )
        .arg(
            Arg::with_name("output")
                .long("output")
                .short("o")
                .takes_value(true)
                .value_name("DIR")
                .default_value("./_output")
                .help("The directory the site is written to"),
        )
        .arg(
            Arg::with_name("drafts")
                .long("drafts")
                .help("Include drafts in the index and feeds"),
        )
        .get_matches();

    let project = Path::new(matches.value_of("project").unwrap_or("."));
    let output = Path::new(matches.value_of("output").unwrap_or("./_output"));

    let result = Config::from_directory(project, output)
        .map_err(|err| Box::new(err) as Box<dyn Error>)
        .and_then(|mut config| {
            config.include_drafts |= matches.is_present("drafts");
            build_site(&config).map_err(|err| Box::new(err) as Box<dyn Error>)
        });

    if let Err(err) = result {
        error!("{}", err);
        let mut source = err.source();
        while let Some(cause) = source {
            error!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}
