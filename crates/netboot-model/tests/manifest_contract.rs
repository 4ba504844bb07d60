// SPDX-License-Identifier: Apache-2.0

use netboot_model::{BootEntry, DistroManifest, KernelArgument, CONSOLE_ARGUMENT};
use std::collections::BTreeSet;

const ALPINE_MANIFEST: &str = r#"
name: Alpine Linux
default: true
kernel: vmlinuz-lts
initrd: initramfs-lts
kernel_args:
  - key: modules
    value: loop,squashfs,sd-mod,usb-storage
  - key: quiet
  - key: alpine_repo
    template: "http://mirror.example/alpine/v{{ base_version }}/main"
  - key: label
    template: "{{ name }} {{ full_version }}"
files:
  modloop: modloop-lts
"#;

fn alpine() -> DistroManifest {
    DistroManifest::from_yaml_slice(ALPINE_MANIFEST.as_bytes()).expect("decode manifest")
}

#[test]
fn manifest_decodes_all_argument_forms_in_order() {
    let manifest = alpine();
    assert_eq!(manifest.name, "Alpine Linux");
    assert!(manifest.default);
    assert_eq!(manifest.kernel, "vmlinuz-lts");
    assert_eq!(manifest.initrd, "initramfs-lts");
    assert_eq!(manifest.kernel_args.len(), 4);
    assert!(matches!(
        &manifest.kernel_args[0],
        KernelArgument::Literal { key, value } if key == "modules" && value.starts_with("loop")
    ));
    assert!(matches!(&manifest.kernel_args[1], KernelArgument::Unary { key } if key == "quiet"));
    assert!(matches!(
        &manifest.kernel_args[2],
        KernelArgument::Template { key, .. } if key == "alpine_repo"
    ));
    assert_eq!(
        manifest.files.get("modloop").and_then(|v| v.as_str()),
        Some("modloop-lts")
    );
}

#[test]
fn missing_default_flag_means_not_default() {
    let manifest =
        DistroManifest::from_yaml_slice(b"name: Debian\nkernel: linux\ninitrd: initrd.gz\n")
            .expect("decode manifest");
    assert!(!manifest.default);
    assert!(manifest.kernel_args.is_empty());
}

#[test]
fn malformed_manifests_are_rejected() {
    for raw in [
        "name: [unterminated",
        "name: NoBootFiles\n",
        "name: x\nkernel: ''\ninitrd: initrd\n",
        "name: x\nkernel: ../vmlinuz\ninitrd: initrd\n",
        "name: x\nkernel: k\ninitrd: i\nkernel_args:\n  - value: orphan\n",
    ] {
        assert!(
            DistroManifest::from_yaml_slice(raw.as_bytes()).is_err(),
            "expected rejection for {raw:?}"
        );
    }
}

#[test]
fn boot_files_must_both_be_present() {
    let manifest = alpine();
    let both: BTreeSet<String> = ["vmlinuz-lts", "initramfs-lts", "modloop-lts"]
        .into_iter()
        .map(str::to_string)
        .collect();
    let kernel_only: BTreeSet<String> = ["vmlinuz-lts"].into_iter().map(str::to_string).collect();
    assert!(manifest.boot_files_present(&both));
    assert!(!manifest.boot_files_present(&kernel_only));
    assert!(!manifest.boot_files_present(&BTreeSet::new()));
}

#[test]
fn kernel_command_line_orders_initrd_args_console() {
    let entry = BootEntry::new("alpine", &alpine(), "3.18.4", "x86_64");
    let line = entry.kernel_command_line();
    assert_eq!(
        line,
        format!(
            "initrd=initramfs-lts modules=loop,squashfs,sd-mod,usb-storage quiet \
             alpine_repo=http://mirror.example/alpine/v3.18/main \
             label=\"Alpine Linux 3.18.4\" {CONSOLE_ARGUMENT}"
        )
    );
}

#[test]
fn failing_template_arguments_are_skipped() {
    let manifest = DistroManifest::from_yaml_slice(
        br#"
name: Broken
kernel: k
initrd: i
kernel_args:
  - key: bad
    template: "{{ no_such_field }}"
  - key: worse
    template: "{% if %}"
  - key: keep
    value: "1"
"#,
    )
    .expect("decode manifest");
    let entry = BootEntry::new("broken", &manifest, "1.0.0", "aarch64");
    assert_eq!(
        entry.kernel_command_line(),
        format!("initrd=i keep=1 {CONSOLE_ARGUMENT}")
    );
}

#[test]
fn entry_serializes_directory_coordinates() {
    let entry = BootEntry::new("alpine", &alpine(), "3.18.4", "aarch64");
    let value = serde_json::to_value(&entry).expect("serialize entry");
    assert_eq!(value["short_name"], "alpine");
    assert_eq!(value["full_version"], "3.18.4");
    assert_eq!(value["architecture"], "aarch64");
    assert_eq!(value["kernel_args"][1]["key"], "quiet");
}
