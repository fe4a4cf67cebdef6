//! The shipped configuration files load and agree with each other.

use std::path::{Path, PathBuf};

use geo_redirect::config::{load_config, load_routing};
use geo_redirect::routing::HostKey;

fn shipped(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("config").join(name)
}

#[test]
fn test_server_config_loads() {
    let config = load_config(&shipped("geo_redirect.toml")).unwrap();
    assert_eq!(config.redirect.routing_path, "config/routing.toml");
    assert_eq!(config.redirect.exclude, vec!["/health".to_string()]);
    assert_eq!(config.session.cookie_name, "geo_redirect_session");
}

#[test]
fn test_toml_and_yaml_routing_match() {
    let toml = load_routing(&shipped("routing.toml")).unwrap();
    let yaml = load_routing(&shipped("routing.yml")).unwrap();

    let keys = |t: &geo_redirect::RoutingTable| {
        t.iter()
            .map(|(k, e)| (k.as_str().to_string(), e.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(keys(&toml), keys(&yaml));
    assert_eq!(toml.hostname(&HostKey::new("il")), Some("b.example.co.il"));
    assert_eq!(toml.default_entry().hostname, "c.example.com");
}
