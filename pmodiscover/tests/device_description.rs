use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use pmodiscover::upnp::{
    DeviceId, DeviceTree, TreeEventKind, UniqueDeviceName, UpnpType, UpnpXml,
};

/// Description réaliste d'un media server avec device embarqué.
const DESCRIPTION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
<root xmlns=\"urn:schemas-upnp-org:device-1-0\">\
  <specVersion><major>1</major><minor>0</minor></specVersion>\
  <device>\
    <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>\
    <friendlyName>Music Box</friendlyName>\
    <manufacturer>PMO</manufacturer>\
    <modelName>MusicBox One</modelName>\
    <UDN>uuid:0ddba11-1234</UDN>\
    <vendorExtension>opaque</vendorExtension>\
    <iconList>\
      <icon>\
        <mimetype>image/png</mimetype>\
        <width>48</width>\
        <height>48</height>\
        <depth>24</depth>\
        <url>/icon.png</url>\
      </icon>\
    </iconList>\
    <serviceList>\
      <service>\
        <serviceType>urn:schemas-upnp-org:service:ContentDirectory:1</serviceType>\
        <serviceId>urn:upnp-org:serviceId:ContentDirectory</serviceId>\
        <SCPDURL>/cds.xml</SCPDURL>\
        <controlURL>/cds/control</controlURL>\
        <eventSubURL>/cds/event</eventSubURL>\
      </service>\
    </serviceList>\
    <deviceList>\
      <device enabled=\"false\">\
        <deviceType>urn:schemas-upnp-org:device:Basic:1</deviceType>\
        <UDN>uuid:abc-123</UDN>\
        <friendlyName>Embedded</friendlyName>\
      </device>\
    </deviceList>\
  </device>\
</root>";

/// Compare deux devices champ à champ, récursivement.
fn assert_same_subtree(tree: &DeviceTree, left: DeviceId, right: DeviceId) {
    let a = tree.device(left);
    let b = tree.device(right);

    assert_eq!(a.is_enabled(), b.is_enabled());
    assert_eq!(a.properties(), b.properties());
    assert_eq!(a.devices().len(), b.devices().len());
    assert_eq!(a.services().len(), b.services().len());
    assert_eq!(a.icons().len(), b.icons().len());

    for (sa, sb) in a.services().iter().zip(b.services().iter()) {
        assert_eq!(tree.service(sa).properties(), tree.service(sb).properties());
    }
    for (ia, ib) in a.icons().iter().zip(b.icons().iter()) {
        assert_eq!(tree.icon(ia).properties(), tree.icon(ib).properties());
    }
    for (da, db) in a.devices().iter().zip(b.devices().iter()) {
        assert_same_subtree(tree, da, db);
    }
}

#[test]
fn test_full_description_parse() {
    let mut tree = DeviceTree::new();
    let device = tree.parse_device_description(DESCRIPTION).unwrap();

    let parsed = tree.device(device);
    assert_eq!(
        parsed.device_type().unwrap(),
        UpnpType::device("MediaServer", 1)
    );
    assert_eq!(parsed.udn().unwrap(), UniqueDeviceName::new("0ddba11-1234"));
    assert_eq!(parsed.friendly_name(), "Music Box");
    assert_eq!(parsed.manufacturer(), "PMO");
    assert_eq!(parsed.model_name(), "MusicBox One");
    assert_eq!(parsed.properties().get("vendorExtension"), Some("opaque"));
    assert_eq!(parsed.devices().len(), 1);
    assert_eq!(parsed.services().len(), 1);
    assert_eq!(parsed.icons().len(), 1);

    let embedded = parsed.devices().iter().next().unwrap();
    let embedded = tree.device(embedded);
    assert!(!embedded.is_enabled());
    assert_eq!(embedded.udn().unwrap().uuid(), "abc-123");

    let service = tree.service(tree.device(device).services().iter().next().unwrap());
    assert_eq!(service.device(), Some(device));
    assert_eq!(
        service.service_type().unwrap(),
        UpnpType::service("ContentDirectory", 1)
    );
    assert_eq!(service.control_url(), "/cds/control");

    let icon = tree.icon(tree.device(device).icons().iter().next().unwrap());
    assert_eq!(icon.device(), Some(device));
    assert_eq!(icon.mimetype(), "image/png");
    assert_eq!(icon.width(), "48");
}

#[test]
fn test_description_roundtrip() {
    let mut tree = DeviceTree::new();
    let original = tree.parse_device_description(DESCRIPTION).unwrap();

    let xml = original.to_xml(&tree);
    let reparsed = tree.parse_device_description(&xml).unwrap();

    assert_same_subtree(&tree, original, reparsed);

    // L'ordre d'insertion du sac doit survivre au cycle complet
    let original_keys: Vec<&str> = tree.device(original).properties().iter().map(|(k, _)| k).collect();
    let reparsed_keys: Vec<&str> = tree.device(reparsed).properties().iter().map(|(k, _)| k).collect();
    assert_eq!(original_keys, reparsed_keys);
}

#[test]
fn test_parsed_tree_can_be_rooted_and_searched() {
    let mut tree = DeviceTree::new();
    let device = tree.parse_device_description(DESCRIPTION).unwrap();

    let root = tree.new_root();
    tree.set_root_device(root, device).unwrap();

    // Tout le sous-arbre partage le même contexte racine
    for id in tree.enumerate_devices(device).collect::<Vec<_>>() {
        assert_eq!(tree.device(id).root(), Some(root));
        assert_eq!(tree.root_device_of(id), Some(device));
    }

    let basic = UpnpType::device("Basic", 1);
    let found: Vec<DeviceId> = tree.find_by_device_type(device, &basic).collect();
    assert_eq!(found.len(), 1);
    assert_eq!(tree.device(found[0]).friendly_name(), "Embedded");

    let services: Vec<_> = tree.enumerate_services(device).collect();
    assert_eq!(services.len(), 1);
}

#[test]
fn test_enumeration_yields_each_device_once_parent_first() {
    let mut tree = DeviceTree::new();
    let top = tree.new_device();

    // Arbre irrégulier sur trois niveaux
    let mut expected = vec![top];
    for _ in 0..3 {
        let branch = tree.new_device();
        tree.add_child_device(top, branch).unwrap();
        expected.push(branch);
        for _ in 0..2 {
            let leaf = tree.new_device();
            tree.add_child_device(branch, leaf).unwrap();
            expected.push(leaf);
        }
    }

    let seen: Vec<DeviceId> = tree.enumerate_devices(top).collect();

    assert_eq!(seen.len(), 10);
    let unique: std::collections::HashSet<DeviceId> = seen.iter().copied().collect();
    assert_eq!(unique.len(), 10);

    // Chaque parent précède tous ses descendants
    for id in &seen {
        if let Some(parent) = tree.device(*id).parent() {
            let parent_pos = seen.iter().position(|x| x == &parent).unwrap();
            let own_pos = seen.iter().position(|x| x == id).unwrap();
            assert!(parent_pos < own_pos);
        }
    }
}

#[test]
fn test_root_invariant_holds_across_deep_mutations() {
    let mut tree = DeviceTree::new();
    let root = tree.new_root();
    let top = tree.new_device();
    tree.set_root_device(root, top).unwrap();

    // Chaîne profonde construite détachée puis greffée
    let head = tree.new_device();
    let mut cursor = head;
    for _ in 0..8 {
        let next = tree.new_device();
        tree.add_child_device(cursor, next).unwrap();
        cursor = next;
    }

    tree.add_child_device(top, head).unwrap();
    for id in tree.enumerate_devices(top).collect::<Vec<_>>() {
        let device = tree.device(id);
        assert_eq!(device.root().is_some(), device.parent().is_some() || id == top);
    }

    tree.remove_child_device(top, head);
    for id in tree.enumerate_devices(head).collect::<Vec<_>>() {
        let device = tree.device(id);
        assert_eq!(device.root(), None);
        // Détaché de l'arbre, mais la structure interne du sous-arbre persiste
        assert_eq!(device.parent().is_none(), id == head);
    }
}

#[test]
fn test_root_observer_counts_every_descendant() {
    let mut tree = DeviceTree::new();
    let root = tree.new_root();
    let top = tree.new_device();
    tree.set_root_device(root, top).unwrap();

    let added = Arc::new(AtomicUsize::new(0));
    let removed = Arc::new(AtomicUsize::new(0));
    {
        let added = Arc::clone(&added);
        let removed = Arc::clone(&removed);
        tree.observe_root(root, move |event| match event.kind {
            TreeEventKind::Added => {
                added.fetch_add(1, Ordering::SeqCst);
            }
            TreeEventKind::Removed => {
                removed.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    // Sous-arbre de 4 devices greffé d'un coup
    let a = tree.new_device();
    let b = tree.new_device();
    let c = tree.new_device();
    let d = tree.new_device();
    tree.add_child_device(a, b).unwrap();
    tree.add_child_device(a, c).unwrap();
    tree.add_child_device(c, d).unwrap();

    tree.add_child_device(top, a).unwrap();
    assert_eq!(added.load(Ordering::SeqCst), 4);
    assert_eq!(removed.load(Ordering::SeqCst), 0);

    tree.remove_child_device(top, a);
    assert_eq!(added.load(Ordering::SeqCst), 4);
    assert_eq!(removed.load(Ordering::SeqCst), 4);
}

#[test]
fn test_moving_subtree_between_roots_notifies_both_sides() {
    let mut tree = DeviceTree::new();
    let root_a = tree.new_root();
    let root_b = tree.new_root();
    let top_a = tree.new_device();
    let top_b = tree.new_device();
    tree.set_root_device(root_a, top_a).unwrap();
    tree.set_root_device(root_b, top_b).unwrap();

    let moved = tree.new_device();
    tree.add_child_device(top_a, moved).unwrap();

    let log_a: Arc<Mutex<Vec<TreeEventKind>>> = Arc::new(Mutex::new(Vec::new()));
    let log_b: Arc<Mutex<Vec<TreeEventKind>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let log_a = Arc::clone(&log_a);
        tree.observe_root(root_a, move |event| log_a.lock().unwrap().push(event.kind));
        let log_b = Arc::clone(&log_b);
        tree.observe_root(root_b, move |event| log_b.lock().unwrap().push(event.kind));
    }

    tree.remove_child_device(top_a, moved);
    tree.add_child_device(top_b, moved).unwrap();

    assert_eq!(log_a.lock().unwrap().as_slice(), &[TreeEventKind::Removed]);
    assert_eq!(log_b.lock().unwrap().as_slice(), &[TreeEventKind::Added]);
    assert_eq!(tree.device(moved).root(), Some(root_b));
}
