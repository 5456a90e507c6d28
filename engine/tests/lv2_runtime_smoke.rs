mod common;

use common::{Cycle, Server};
use lv2host_engine::plugins::lv2::{Lv2Catalog, Lv2Plugin};
use lv2host_engine::{BindOptions, CycleDriver, PortKind, bind_ports, release_ports};

/// Runs a few cycles of the first plugin whose ports are all bindable.
#[test]
fn lv2_bind_and_process_smoke() {
    let uris: Vec<_> = Lv2Catalog::new()
        .list_plugins()
        .into_iter()
        .map(|info| info.uri)
        .collect();
    if uris.is_empty() {
        eprintln!("No LV2 plugin found; skipping");
        return;
    }

    for uri in uris {
        let Ok(mut plugin) = Lv2Plugin::instantiate(Lv2Catalog::new(), &uri, 48_000.0) else {
            continue;
        };
        let mut server = Server::default();
        let ports = bind_ports(&mut plugin, &mut server, &BindOptions::default());
        if ports.iter().any(|port| port.kind() == PortKind::Unknown) {
            release_ports(&mut server, ports);
            continue;
        }

        eprintln!("Processing LV2 plugin: {uri}");
        plugin.activate();
        assert!(plugin.is_active());
        let mut driver = CycleDriver::new(plugin, ports);
        let cycle = Cycle::new(256, &server);
        for _ in 0..4 {
            driver.process(&cycle);
        }

        let (plugin, ports) = driver.into_parts();
        drop(plugin);
        release_ports(&mut server, ports);
        assert_eq!(server.unregistered.len(), server.registered.len());
        return;
    }
    eprintln!("No LV2 plugin with bindable ports; skipping");
}
