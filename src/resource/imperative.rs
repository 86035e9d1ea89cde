//! Kinds driven by an explicit verb
//!
//! The descriptor's `state` names the operation (`add`, `set`, `show`,
//! ...) and the remaining keys pick the command. Nothing is read back
//! first; the resolved rule's command runs as-is and its output is parsed
//! with the rule's columns.

use converge::{ActionRule, Catalog, CommandSpec, ResourceKind, Result, TemplateCatalog, Verb};

/// States that only read
const READ_ONLY: &[&str] = &["show", "status", "test", "list"];

/// Rule selected by `state` (plus any extra predicates)
fn on(id: &str, state: &str) -> ActionRule {
    let rule = ActionRule::new(id).when("state", state);
    if READ_ONLY.contains(&state) {
        rule
    } else {
        rule.mutating()
    }
}

struct Entry {
    rule: ActionRule,
    template: &'static str,
    optional: &'static [&'static str],
}

/// Accumulates the rule/command pairs of one imperative kind
struct Imperative {
    kind: &'static str,
    entries: Vec<Entry>,
    renames: Vec<(&'static str, &'static str)>,
}

impl Imperative {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            renames: Vec::new(),
        }
    }

    fn command(self, rule: ActionRule, template: &'static str) -> Self {
        self.command_with(rule, template, &[])
    }

    /// Command that appends `key value` for each optional key present
    fn command_with(
        mut self,
        rule: ActionRule,
        template: &'static str,
        optional: &'static [&'static str],
    ) -> Self {
        self.entries.push(Entry {
            rule,
            template,
            optional,
        });
        self
    }

    /// Wire spelling shared by every command of the kind
    fn rename(mut self, from: &'static str, to: &'static str) -> Self {
        self.renames.push((from, to));
        self
    }

    fn build(self) -> Result<ResourceKind> {
        let mut rules = Catalog::new(self.kind);
        let mut templates = TemplateCatalog::new();
        for entry in self.entries {
            let spec = self
                .renames
                .iter()
                .fold(
                    CommandSpec::shell(entry.template)?.optional(entry.optional),
                    |spec, (from, to)| spec.rename(from, to),
                );
            templates = templates.with(&entry.rule.id, Verb::Run, spec);
            rules = rules.rule(entry.rule);
        }
        Ok(ResourceKind::new(self.kind, rules, templates).imperative())
    }
}

pub fn net() -> Result<ResourceKind> {
    Imperative::new("net")
        .command(
            on("aggregate-add", "add")
                .when("option", "aggregate")
                .requires(&["virtual-ifname", "physical-ifname", "aggregate"]),
            "net aggregate add $virtual-ifname interfaces $physical-ifname $aggregate",
        )
        .command(
            on("aggregate-del", "del")
                .when("option", "aggregate")
                .requires(&["virtual-ifname", "physical-ifname"]),
            "net aggregate del $virtual-ifname interfaces $physical-ifname",
        )
        .command(
            on("aggregate-modify", "modify")
                .when("option", "aggregate")
                .requires(&["virtual-ifname", "aggregate"]),
            "net aggregate modify $virtual-ifname $aggregate",
        )
        .command(
            on("failover-add", "add")
                .when("option", "failover")
                .requires(&["virtual-ifname", "ifname", "failover"]),
            "net failover add $virtual-ifname interfaces $ifname $failover",
        )
        .command(
            on("failover-del", "del")
                .when("option", "failover")
                .requires(&["virtual-ifname", "ifname"]),
            "net failover del $virtual-ifname interfaces $ifname",
        )
        .command(
            on("failover-modify", "modify")
                .when("option", "failover")
                .requires(&["virtual-ifname", "failover"]),
            "net failover modify $virtual-ifname $failover",
        )
        .command(
            on("hosts-add", "add").when("option", "hosts").requires(&["host-list"]),
            "net hosts add $host-list",
        )
        .command(
            on("hosts-del", "del").when("option", "hosts").requires(&["ipaddr"]),
            "net hosts del $ipaddr",
        )
        .command(on("hosts-reset", "reset").when("option", "hosts"), "net hosts reset")
        .command(
            on("route-net-add", "add")
                .when("option", "route")
                .requires(&["network", "netmask", "gateway", "ifname"]),
            "net route add net $network netmask $netmask gw $gateway dev $ifname",
        )
        .command(
            on("route-host-add", "add")
                .when("option", "route")
                .requires(&["ipaddr", "gateway", "ifname"]),
            "net route add host $ipaddr gw $gateway dev $ifname",
        )
        .command(
            on("route-net-del", "del")
                .when("option", "route")
                .requires(&["network", "netmask", "gateway", "ifname"]),
            "net route del net $network netmask $netmask gw $gateway dev $ifname",
        )
        .command(
            on("route-host-del", "del")
                .when("option", "route")
                .requires(&["ipaddr", "gateway", "ifname"]),
            "net route del host $ipaddr gw $gateway dev $ifname",
        )
        .command(
            on("lookup", "test").when("option", "lookup").requires(&["ipaddr"]),
            "net lookup $ipaddr",
        )
        .command(
            on("ping", "test")
                .when("option", "ping")
                .requires(&["ipaddr", "count"]),
            "net ping $ipaddr count $count",
        )
        .command(
            on("domainname-set", "set")
                .when("option", "domainname")
                .requires(&["domainname"]),
            "net set domainname $domainname",
        )
        .command(
            on("searchdomains-set", "set")
                .when("option", "searchdomains")
                .requires(&["searchdomains"]),
            "net set searchdomains $searchdomains",
        )
        .command(
            on("dns-set", "set").when("option", "dns").requires(&["dns"]),
            "net set dns $dns",
        )
        .command(
            on("hostname-set", "set")
                .when("option", "hostname")
                .requires(&["hostname"]),
            "net set hostname $hostname",
        )
        .command(
            on("domainname-reset", "reset").when("option", "domainname"),
            "net reset domainname",
        )
        .command(
            on("searchdomains-reset", "reset").when("option", "searchdomains"),
            "net reset searchdomains",
        )
        .command(on("dns-reset", "reset").when("option", "dns"), "net reset dns")
        .command(
            on("hostname-reset", "reset").when("option", "hostname"),
            "net reset hostname",
        )
        .command_with(
            on("interface-config", "config").requires(&["ifname", "ipaddr", "netmask"]),
            "net config $ifname $ipaddr netmask $netmask",
            &["mtu"],
        )
        .command_with(
            on("interface-create", "create").requires(&["ifname"]),
            "net create interface $ifname",
            &["vlan"],
        )
        .command(
            on("veth-create", "create").requires(&["vethid"]),
            "net create virtual veth$vethid",
        )
        .command(
            on("interface-destroy", "destroy").requires(&["ifname"]),
            "net destroy $ifname",
        )
        .command(
            on("interface-enable", "enable").requires(&["ifname"]),
            "net enable $ifname",
        )
        .command(
            on("settings", "show").columns(&[
                "port",
                "enabled",
                "state",
                "dhcp",
                "ip-address",
                "netmask",
                "type",
                "additional-setting",
            ]),
            "net show settings",
        )
        .build()
}

pub fn config() -> Result<ResourceKind> {
    let mut kind = Imperative::new("config");
    for (option, template) in [
        ("admin-email", "config set admin-email $admin-email"),
        ("admin-host", "config set admin-host $admin-host"),
        ("location", "config set location $location"),
        ("mailserver", "config set mailserver $mailserver"),
        ("timezone", "config set timezone $timezone"),
    ] {
        kind = kind.command(
            on(&format!("{option}-set"), "set").requires(&[option]),
            template,
        );
    }
    for (option, template) in [
        ("admin-email", "config reset admin-email"),
        ("admin-host", "config reset admin-host"),
        ("location", "config reset location"),
        ("mailserver", "config reset mailserver"),
        ("timezone", "config reset timezone"),
    ] {
        kind = kind.command(
            on(&format!("{option}-reset"), "reset").when("option", option),
            template,
        );
    }
    kind.build()
}

pub fn adminaccess() -> Result<ResourceKind> {
    Imperative::new("adminaccess")
        .command(
            on("enable", "enable").requires(&["service"]),
            "adminaccess enable $service",
        )
        .command(
            on("disable", "disable").requires(&["service"]),
            "adminaccess disable $service",
        )
        .command(on("show", "show"), "adminaccess show")
        .build()
}

pub fn replication() -> Result<ResourceKind> {
    Imperative::new("replication")
        .command_with(
            on("add", "add").requires(&["source", "destination"]),
            "replication add source $source destination $destination",
            &[
                "low-bw-optim",
                "encryption",
                "propagate-retention-lock",
                "ipversion",
                "max-repl-streams",
                "destination-tenant-unit",
            ],
        )
        .command_with(
            on("modify", "modify").requires(&["destination"]),
            "replication modify $destination",
            &[
                "repl-port",
                "low-bw-optim",
                "encryption",
                "max-repl-streams",
                "destination-tenant-unit",
                "crepl-gc-bw-optim",
                "source-host",
                "destination-host",
            ],
        )
        .command(
            on("break", "break").requires(&["destination"]),
            "replication break $destination",
        )
        .command(
            on("disable", "disable").requires(&["destination"]),
            "replication disable $destination",
        )
        .command(
            on("enable", "enable").requires(&["destination"]),
            "replication enable $destination",
        )
        .command(
            on("initialize", "initialize").requires(&["destination"]),
            "replication initialize $destination",
        )
        .command(
            on("resync", "resync").requires(&["destination"]),
            "replication resync $destination",
        )
        .command(
            on("sync", "sync").requires(&["destination"]),
            "replication sync $destination",
        )
        .command(
            on("recover", "recover").requires(&["destination"]),
            "replication recover $destination",
        )
        .command(
            on("option-set", "set").requires(&["option"]),
            "replication option set $option",
        )
        .command(
            on("option-reset", "reset").requires(&["option"]),
            "replication option reset $option",
        )
        .command(on("status", "status"), "replication status")
        .command(
            on("show-option", "show").requires(&["option"]),
            "replication option show",
        )
        .command_with(
            on("show-config", "show").columns(&[
                "ctx",
                "source",
                "destination",
                "connection-host",
                "connection-port",
                "low-bw-optim",
                "repl-gc-bw-optim",
                "encryption",
                "enabled",
                "max-repl-streams",
            ]),
            "replication show config",
            &["destination"],
        )
        .rename("repl-port", "port")
        .build()
}

pub fn filesys() -> Result<ResourceKind> {
    let encryption = |id: &str, state: &str| on(id, state).when("operation", "encryption");
    let clean = |id: &str, state: &str| on(id, state).when("operation", "clean");

    Imperative::new("filesys")
        .command(
            clean("clean-reset", "reset").requires(&["clean"]),
            "filesys clean reset $clean",
        )
        .command(
            clean("clean-set", "set").requires(&["clean"]),
            "filesys clean set $clean",
        )
        .command(clean("clean-start", "start"), "filesys clean start")
        .command(clean("clean-stop", "stop"), "filesys clean stop")
        .command(clean("clean-status", "status"), "filesys clean status")
        .command(
            encryption("ekm-set", "set")
                .when("encryption", "embedded-key-manager")
                .requires(&["key-rotation-policy"]),
            "filesys encryption embedded-key-manager set key-rotation-policy $key-rotation-policy",
        )
        .command(
            encryption("ekm-reset", "reset").when("encryption", "embedded-key-manager"),
            "filesys encryption embedded-key-manager reset key-rotation-policy",
        )
        .command(
            encryption("key-manager-set", "set")
                .when("encryption", "key-manager")
                .requires(&["external-key-manager"]),
            "filesys encryption key-manager set $external-key-manager",
        )
        .command(
            encryption("key-manager-rotation-set", "set")
                .when("encryption", "key-manager")
                .requires(&["key-rotation-policy"]),
            "filesys encryption key-manager set key-rotation-policy $key-rotation-policy",
        )
        .command(
            encryption("key-manager-disable", "disable").when("encryption", "key-manager"),
            "filesys encryption key-manager disable",
        )
        .command(
            encryption("key-manager-enable", "enable").when("encryption", "key-manager"),
            "filesys encryption key-manager enable",
        )
        .command(
            encryption("algorithm-set", "set")
                .when("encryption", "algorithm")
                .requires(&["algorithm"]),
            "filesys encryption algorithm set $algorithm",
        )
        .command_with(
            encryption("encryption-reset", "reset").requires(&["encryption"]),
            "filesys encryption $encryption reset",
            &["key-rotation-policy"],
        )
        .command(
            encryption("keys-create", "create").requires(&["encryption"]),
            "filesys encryption $encryption keys create",
        )
        .command(
            encryption("abort-apply", "abort-apply-changes"),
            "filesys encryption abort-apply-changes",
        )
        .command(
            encryption("apply", "apply-changes"),
            "filesys encryption apply-changes",
        )
        .command_with(
            encryption("encryption-disable", "disable"),
            "filesys encryption disable",
            &["tier"],
        )
        .command_with(
            encryption("encryption-enable", "enable"),
            "filesys encryption enable",
            &["tier"],
        )
        .command_with(
            encryption("keys-delete", "delete"),
            "filesys encryption keys delete",
            &["key-id", "muid", "tier"],
        )
        .command_with(
            encryption("keys-destroy", "destroy"),
            "filesys encryption keys destroy",
            &["key-id", "muid", "tier"],
        )
        .command(encryption("keys-sync", "sync"), "filesys encryption keys sync")
        .command(
            on("fastcopy", "create")
                .when("operation", "fastcopy")
                .requires(&["fastcopy-source", "fastcopy-destination"]),
            "filesys fastcopy source $fastcopy-source destination $fastcopy-destination",
        )
        .command(on("enable", "enable"), "filesys enable")
        .command(on("create", "create"), "filesys create")
        .command(on("status", "status"), "filesys status")
        .build()
}

pub fn compression() -> Result<ResourceKind> {
    let schedule = |id: &str, state: &str| on(id, state).requires(&["schedule"]);

    Imperative::new("compression")
        .command(
            schedule("schedule-enable", "enable"),
            "compression physical-capacity-measurement schedule enable $schedule",
        )
        .command(
            schedule("schedule-disable", "disable"),
            "compression physical-capacity-measurement schedule disable $schedule",
        )
        .command(
            schedule("schedule-destroy", "destroy"),
            "compression physical-capacity-measurement schedule destroy $schedule",
        )
        .command(
            schedule("schedule-modify", "modify"),
            "compression physical-capacity-measurement schedule modify $schedule",
        )
        .command(
            schedule("schedule-del", "del"),
            "compression physical-capacity-measurement schedule del $schedule",
        )
        .command(
            schedule("schedule-create", "create"),
            "compression physical-capacity-measurement schedule create $schedule",
        )
        .command(
            schedule("schedule-add", "add"),
            "compression physical-capacity-measurement schedule add $schedule",
        )
        .command(
            schedule("schedule-show", "show"),
            "compression physical-capacity-measurement schedule show $schedule",
        )
        .command(
            on("sample-stop", "stop").requires(&["sample"]),
            "compression physical-capacity-measurement sample stop $sample",
        )
        .command(
            on("sample-start", "start").requires(&["sample"]),
            "compression physical-capacity-measurement sample start $sample",
        )
        .command(
            on("throttle-set", "set").requires(&["throttle"]),
            "compression physical-capacity-measurement throttle set $throttle",
        )
        .command(
            on("throttle-reset", "reset").requires(&["throttle"]),
            "compression physical-capacity-measurement throttle reset",
        )
        .command(
            on("throttle-show", "show").requires(&["throttle"]),
            "compression physical-capacity-measurement throttle show",
        )
        .command(
            on("status", "status"),
            "compression physical-capacity-measurement status",
        )
        .command(
            on("enable-initialize", "enable").requires(&["initialize"]),
            "compression physical-capacity-measurement enable and-initialize",
        )
        .command(
            on("enable", "enable"),
            "compression physical-capacity-measurement enable",
        )
        .command(
            on("disable", "disable"),
            "compression physical-capacity-measurement disable",
        )
        .build()
}
