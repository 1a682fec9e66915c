/*!
# Switchboard Relay

## Help

```bash
switchboard help
```

## Example Usage

```bash
switchboard --config config
```

## Dev

To run from source:

```bash
cargo run -- --help
cargo run -- --config config
```
*/

use clap::{App, Arg};
use switchboard::networking::relay;

#[tokio::main]
pub async fn main() -> switchboard::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = App::new("Switchboard Relay")
        .about("Runs a named-peer message relay")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .help("config file name"),
        )
        .get_matches();

    let config_name = match matches.value_of("config") {
        Some(name) => name,
        None => "config",
    };

    let mut settings = config::Config::default();
    settings.merge(config::File::with_name(config_name))?;

    relay::run(settings).await
}
