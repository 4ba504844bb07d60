// SPDX-License-Identifier: Apache-2.0

//! iPXE menu rendering.
//!
//! The renderer keeps an architecture-partitioned view of the latest catalog
//! snapshot. Within each architecture the default entry comes first and the
//! rest keep snapshot order.

pub mod vars;

pub use vars::VarsConfig;

use crate::catalog::SnapshotReceiver;
use minijinja::{context, Environment};
use netboot_model::{BootEntry, EntryFields};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const ARCH_X86_64: &str = "x86_64";
pub const ARCH_AARCH64: &str = "aarch64";

pub const DEFAULT_IPXE_TEMPLATE: &str = include_str!("../../templates/boot.ipxe.j2");

const TEMPLATE_NAME: &str = "boot.ipxe";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderError(pub String);

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for RenderError {}

#[derive(Default)]
struct RenderState {
    x86_distros: Vec<BootEntry>,
    arm64_distros: Vec<BootEntry>,
    template: Option<Environment<'static>>,
}

#[derive(Serialize)]
struct MenuEntry<'a> {
    #[serde(flatten)]
    fields: EntryFields<'a>,
    kernel_command_line: String,
}

fn menu_entries(entries: &[BootEntry]) -> Vec<MenuEntry<'_>> {
    entries
        .iter()
        .map(|entry| MenuEntry {
            fields: entry.template_fields(),
            kernel_command_line: entry.kernel_command_line(),
        })
        .collect()
}

/// Splits a snapshot into the `x86_64` and `aarch64` menu lists, each with
/// its default entry moved to the front.
#[must_use]
pub fn partition_for_menu(snapshot: &[BootEntry]) -> (Vec<BootEntry>, Vec<BootEntry>) {
    let select = |arch: &str| {
        let mut list: Vec<BootEntry> = snapshot
            .iter()
            .filter(|e| e.architecture() == arch)
            .cloned()
            .collect();
        list.sort_by_key(|e| !e.is_default());
        list
    };
    (select(ARCH_X86_64), select(ARCH_AARCH64))
}

pub struct IpxeRenderer {
    vars: VarsConfig,
    http_server: String,
    ntp_server: String,
    state: RwLock<RenderState>,
}

impl IpxeRenderer {
    #[must_use]
    pub fn new(vars: VarsConfig, http_server: String, ntp_server: String) -> Self {
        Self {
            vars,
            http_server,
            ntp_server,
            state: RwLock::new(RenderState::default()),
        }
    }

    /// Compiles `source` and replaces the current template.
    pub async fn parse_template(&self, source: &str) -> Result<(), RenderError> {
        let mut env = Environment::new();
        env.add_template_owned(TEMPLATE_NAME, source.to_string())
            .map_err(|e| RenderError(format!("parse template: {e}")))?;
        self.state.write().await.template = Some(env);
        Ok(())
    }

    pub async fn update(&self, snapshot: &[BootEntry]) {
        let (x86_distros, arm64_distros) = partition_for_menu(snapshot);
        let mut state = self.state.write().await;
        info!(
            x86_64 = x86_distros.len(),
            aarch64 = arm64_distros.len(),
            "iPXE menu updated"
        );
        state.x86_distros = x86_distros;
        state.arm64_distros = arm64_distros;
    }

    pub async fn menu(&self, architecture: &str) -> Vec<BootEntry> {
        let state = self.state.read().await;
        match architecture {
            ARCH_X86_64 => state.x86_distros.clone(),
            ARCH_AARCH64 => state.arm64_distros.clone(),
            _ => Vec::new(),
        }
    }

    pub async fn render(&self) -> Result<String, RenderError> {
        let state = self.state.read().await;
        let env = state
            .template
            .as_ref()
            .ok_or_else(|| RenderError("no template loaded".to_string()))?;
        let template = env
            .get_template(TEMPLATE_NAME)
            .map_err(|e| RenderError(e.to_string()))?;
        template
            .render(context! {
                default_vars => &self.vars.default_vars,
                product_vars => &self.vars.product_vars,
                http_server => &self.http_server,
                ntp_server => &self.ntp_server,
                x86_distros => menu_entries(&state.x86_distros),
                arm64_distros => menu_entries(&state.arm64_distros),
            })
            .map_err(|e| RenderError(format!("render template: {e}")))
    }

    /// Applies the current snapshot of `snapshots`, then every later one,
    /// until shutdown or until the catalog goes away.
    pub fn spawn_watch(
        self: &Arc<Self>,
        mut snapshots: SnapshotReceiver,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let renderer = Arc::clone(self);
        tokio::spawn(async move {
            info!("iPXE catalog watcher started");
            loop {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    changed = snapshots.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = snapshots.borrow_and_update().clone();
                        renderer.update(&snapshot).await;
                    }
                }
            }
            info!("iPXE catalog watcher stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netboot_model::DistroManifest;

    fn entry(family: &str, version: &str, arch: &str, default: bool) -> BootEntry {
        let raw = format!("name: {family}\ndefault: {default}\nkernel: k\ninitrd: i\n");
        let manifest = DistroManifest::from_yaml_slice(raw.as_bytes()).expect("manifest");
        BootEntry::new(family, &manifest, version, arch)
    }

    fn versions(list: &[BootEntry]) -> Vec<&str> {
        list.iter().map(BootEntry::full_version).collect()
    }

    #[test]
    fn default_moves_first_and_rest_keep_order() {
        let snapshot = vec![
            entry("alpine", "3.0", ARCH_X86_64, false),
            entry("alpine", "2.0", ARCH_X86_64, true),
            entry("alpine", "1.0", ARCH_X86_64, false),
        ];
        let (x86, arm) = partition_for_menu(&snapshot);
        assert_eq!(versions(&x86), vec!["2.0", "3.0", "1.0"]);
        assert!(arm.is_empty());
    }

    #[test]
    fn unknown_architectures_are_dropped() {
        let snapshot = vec![
            entry("alpine", "3.0", "riscv64", true),
            entry("alpine", "3.0", ARCH_AARCH64, false),
        ];
        let (x86, arm) = partition_for_menu(&snapshot);
        assert!(x86.is_empty());
        assert_eq!(versions(&arm), vec!["3.0"]);
    }

    #[tokio::test]
    async fn render_exposes_entry_helpers_and_scalars() {
        let renderer = IpxeRenderer::new(
            VarsConfig::default(),
            "http://boot.example".to_string(),
            "ntp.example".to_string(),
        );
        renderer
            .parse_template(
                "{{ http_server }} {{ ntp_server }}\n\
                 {% for d in x86_distros %}{{ d.slug }} {{ d.distro_path }} {{ d.kernel_command_line }}\n{% endfor %}",
            )
            .await
            .expect("parse");
        renderer
            .update(&[entry("alpine", "3.18.4", ARCH_X86_64, false)])
            .await;
        let out = renderer.render().await.expect("render");
        assert_eq!(
            out,
            "http://boot.example ntp.example\n\
             alpine-3.18.4-x86_64 /distros/alpine/3.18.4/x86_64 initrd=i console=ttyS0,115200n8\n"
        );
    }

    #[tokio::test]
    async fn render_without_template_or_with_bad_template_fails() {
        let renderer = IpxeRenderer::new(VarsConfig::default(), String::new(), String::new());
        assert!(renderer.render().await.is_err());
        assert!(renderer.parse_template("{% for %}").await.is_err());
        renderer
            .parse_template("{{ no_such_value.field }}")
            .await
            .expect("parse");
        let err = renderer.render().await.expect_err("undefined attribute");
        assert!(err.to_string().starts_with("render template"));
    }

    #[tokio::test]
    async fn bundled_template_renders() {
        let renderer = IpxeRenderer::new(
            VarsConfig::default(),
            "http://boot.example".to_string(),
            "ntp.example".to_string(),
        );
        renderer
            .parse_template(DEFAULT_IPXE_TEMPLATE)
            .await
            .expect("parse bundled template");
        renderer
            .update(&[
                entry("alpine", "3.18.4", ARCH_X86_64, true),
                entry("alpine", "3.18.4", ARCH_AARCH64, false),
            ])
            .await;
        let out = renderer.render().await.expect("render");
        assert!(out.starts_with("#!ipxe"));
        assert!(out.contains("alpine-3.18.4-x86_64"));
        assert!(out.contains("alpine-3.18.4-aarch64"));
    }
}
