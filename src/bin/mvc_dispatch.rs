//! Demo host: dispatches one route through a small demo application and
//! prints the response, or runs the segment codec.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use http::HeaderValue;
use mvc_dispatch::app::Application;
use mvc_dispatch::codec::{decode_segment, encode_segment};
use mvc_dispatch::config::{Environment, MapConfiguration};
use mvc_dispatch::controller::{Action, Controller};
use mvc_dispatch::dispatcher::{Dispatcher, Request, AJAX_HEADER};
use mvc_dispatch::error::{DispatchError, ErrorRecord, RoutingError};
use mvc_dispatch::logging::{init_logging, LogConfig, TracingSink};
use mvc_dispatch::registry::Registry;
use mvc_dispatch::route::{Parameters, RouteTarget};
use mvc_dispatch::security::{Authentication, SecurityRequest};
use mvc_dispatch::session::MemorySession;

/// Command-line interface of the demo host
#[derive(Parser)]
#[command(name = "mvc-dispatch")]
#[command(about = "Dispatch a route through the demo application", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch one route and print the response
    Dispatch {
        /// Route (`controller/action/param/...`); omit for the default route
        #[arg(short, long)]
        route: Option<String>,

        /// Configuration file (YAML, TOML or JSON) overriding the demo settings
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Send the request as a script (AJAX) call
        #[arg(long, default_value_t = false)]
        ajax: bool,

        /// Prefix of environment variables read as constants
        #[arg(long, env = "MVC_ENV_PREFIX", default_value = "MVC_")]
        env_prefix: String,
    },
    /// Encode a value as a route segment
    Encode { value: String },
    /// Decode a route segment
    Decode { value: String },
}

fn main() -> anyhow::Result<()> {
    init_logging(&LogConfig::from_env())?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Dispatch {
            route,
            config,
            ajax,
            env_prefix,
        } => dispatch(route, config, ajax, &env_prefix),
        Commands::Encode { value } => {
            println!("{}", encode_segment(&value));
            Ok(())
        }
        Commands::Decode { value } => {
            println!("{}", decode_segment(&value));
            Ok(())
        }
    }
}

fn dispatch(
    route: Option<String>,
    config: Option<PathBuf>,
    ajax: bool,
    env_prefix: &str,
) -> anyhow::Result<()> {
    let configuration = match config {
        Some(path) => MapConfiguration::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => demo_configuration(),
    };

    let app = Application::new(demo_registry())
        .with_environment(Environment::from_env(env_prefix))
        .with_configuration(Arc::new(configuration))
        .with_sink(Arc::new(TracingSink));

    let mut request = Request::new(route.as_deref());
    if ajax {
        request
            .headers
            .insert(AJAX_HEADER, HeaderValue::from_static("XMLHttpRequest"));
    }

    let response = app
        .handle(request, Some(Box::new(MemorySession::new())))
        .context("dispatch failed")?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", response.status)?;
    for (name, value) in &response.headers {
        writeln!(stdout, "{}: {}", name, value.to_str().unwrap_or("<binary>"))?;
    }
    writeln!(stdout)?;
    stdout.write_all(&response.body)?;
    writeln!(stdout)?;
    Ok(())
}

fn demo_configuration() -> MapConfiguration {
    MapConfiguration::new()
        .with("CLIENT_CHARSET", "UTF-8")
        .with("CLIENT_LANGUAGE", "en_GB")
        .with("SECURITY_POLICY", "demo")
        .with("DEFAULT_CONTROLLER", "home")
        .with("DEFAULT_ACTION", "index")
        .with("ERROR_CONTROLLER", "error")
        .with("ERROR_ACTION", "index")
        .with("ERROR_AJAX_ACTION", "ajax")
        .with("URL", "/")
}

fn demo_registry() -> Registry {
    Registry::new()
        .controller::<Home>("home")
        .controller::<Blog>("blog")
        .controller::<ErrorPage>("error")
        .security_policy("demo", || DemoPolicy)
}

/// Denies the `admin` controller, lets everything else through.
struct DemoPolicy;

impl Authentication for DemoPolicy {
    fn authenticate(
        &mut self,
        target: RouteTarget,
        _req: &mut SecurityRequest<'_>,
    ) -> Option<RouteTarget> {
        (!target.controller.eq_ignore_ascii_case("admin")).then_some(target)
    }
}

struct Home;

impl Home {
    fn index(&mut self, d: &mut Dispatcher, _: &Parameters) -> Result<(), DispatchError> {
        write!(d.output(), "<h1>Home</h1>").map_err(DispatchError::fatal)
    }
}

impl Controller for Home {
    fn create(_: &mut Dispatcher) -> Result<Self, DispatchError> {
        Ok(Home)
    }

    fn action(name: &str) -> Option<Action<Self>> {
        match name {
            "index" => Some(Home::index),
            _ => None,
        }
    }
}

struct Blog;

impl Blog {
    fn show(&mut self, d: &mut Dispatcher, params: &Parameters) -> Result<(), DispatchError> {
        let id = params
            .get("id")
            .ok_or_else(|| RoutingError::application("Missing post id."))?;
        write!(d.output(), "<h1>Post {id}</h1>").map_err(DispatchError::fatal)
    }

    fn latest(&mut self, d: &mut Dispatcher, _: &Parameters) -> Result<(), DispatchError> {
        let mut params = Parameters::associative();
        params.insert("id", "1");
        d.forward("blog", "show", &params, true)
    }

    fn broken(&mut self, _: &mut Dispatcher, _: &Parameters) -> Result<(), DispatchError> {
        Err(anyhow::anyhow!("storage backend unavailable").into())
    }
}

impl Controller for Blog {
    fn create(_: &mut Dispatcher) -> Result<Self, DispatchError> {
        Ok(Blog)
    }

    fn action(name: &str) -> Option<Action<Self>> {
        match name {
            "show" => Some(Blog::show),
            "latest" => Some(Blog::latest),
            "broken" => Some(Blog::broken),
            _ => None,
        }
    }
}

struct ErrorPage;

impl ErrorPage {
    fn index(&mut self, d: &mut Dispatcher, params: &Parameters) -> Result<(), DispatchError> {
        let out = d.output();
        write!(out, "<h1>Error</h1><ul>").map_err(DispatchError::fatal)?;
        for message in params.errors().iter().filter_map(ErrorRecord::user_message) {
            write!(out, "<li>{message}</li>").map_err(DispatchError::fatal)?;
        }
        write!(out, "</ul>").map_err(DispatchError::fatal)
    }

    fn ajax(&mut self, d: &mut Dispatcher, params: &Parameters) -> Result<(), DispatchError> {
        let messages: Vec<&str> = params
            .errors()
            .iter()
            .filter_map(ErrorRecord::user_message)
            .collect();
        let out = d.output();
        write!(out, "{}", messages.join("\n")).map_err(DispatchError::fatal)
    }
}

impl Controller for ErrorPage {
    fn create(_: &mut Dispatcher) -> Result<Self, DispatchError> {
        Ok(ErrorPage)
    }

    fn action(name: &str) -> Option<Action<Self>> {
        match name {
            "index" => Some(ErrorPage::index),
            "ajax" => Some(ErrorPage::ajax),
            _ => None,
        }
    }
}
