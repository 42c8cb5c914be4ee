//! Codec XML du document de description de device.
//!
//! La lecture est un parcours événementiel quick-xml qui construit le
//! sous-arbre à travers les collections à hooks ; l'écriture reconstruit un
//! arbre d'éléments xmltree. Les éléments non reconnus d'un `device`
//! deviennent des entrées du sac de propriétés (première occurrence
//! gagnante) et ressortent comme éléments enfants, dans l'ordre
//! d'insertion.

use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;
use xmltree::{Element, EmitterConfig, XMLNode};

use super::bag::PropertyBag;
use super::errors::XmlError;
use super::tree::{DeviceId, DeviceTree, IconId, ServiceId};

/// Sérialisation XML des entités de l'arbre.
pub trait UpnpXml {
    /// Construit l'élément XML de l'entité.
    fn to_xml_element(&self, tree: &DeviceTree) -> Element;

    /// Document XML complet, indenté, avec déclaration.
    fn to_xml(&self, tree: &DeviceTree) -> String {
        let elem = self.to_xml_element(tree);

        let config = EmitterConfig::new()
            .perform_indent(true)
            .indent_string("  ")
            .write_document_declaration(false);

        let mut buf = Vec::new();
        elem.write_with_config(&mut buf, config)
            .expect("Failed to write XML");

        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&String::from_utf8(buf).expect("Invalid UTF-8"));
        xml
    }
}

impl UpnpXml for DeviceId {
    fn to_xml_element(&self, tree: &DeviceTree) -> Element {
        let device = tree.device(*self);
        let mut elem = bag_element("device", device.properties());

        if !device.is_enabled() {
            elem.attributes
                .insert("enabled".to_string(), "false".to_string());
        }

        if !device.devices().is_empty() {
            let mut list = Element::new("deviceList");
            for child in device.devices().iter() {
                list.children.push(XMLNode::Element(child.to_xml_element(tree)));
            }
            elem.children.push(XMLNode::Element(list));
        }

        if !device.services().is_empty() {
            let mut list = Element::new("serviceList");
            for service in device.services().iter() {
                list.children
                    .push(XMLNode::Element(service.to_xml_element(tree)));
            }
            elem.children.push(XMLNode::Element(list));
        }

        if !device.icons().is_empty() {
            let mut list = Element::new("iconList");
            for icon in device.icons().iter() {
                list.children.push(XMLNode::Element(icon.to_xml_element(tree)));
            }
            elem.children.push(XMLNode::Element(list));
        }

        elem
    }
}

impl UpnpXml for ServiceId {
    fn to_xml_element(&self, tree: &DeviceTree) -> Element {
        bag_element("service", tree.service(*self).properties())
    }
}

impl UpnpXml for IconId {
    fn to_xml_element(&self, tree: &DeviceTree) -> Element {
        bag_element("icon", tree.icon(*self).properties())
    }
}

/// Élément dont les enfants sont les entrées du sac, dans l'ordre
/// d'insertion.
fn bag_element(name: &str, bag: &PropertyBag) -> Element {
    let mut elem = Element::new(name);

    for (key, value) in bag.iter() {
        let mut property = Element::new(key);
        if !value.is_empty() {
            property.children.push(XMLNode::Text(value.to_string()));
        }
        elem.children.push(XMLNode::Element(property));
    }

    elem
}

impl DeviceTree {
    /// Parse un document de description complet.
    ///
    /// Retourne le device décrit par le premier élément `device` du
    /// document, détaché : à désigner comme racine ou à rattacher par
    /// l'appelant. Sur erreur, les nœuds partiellement construits restent
    /// détachés dans l'arène ; l'appelant abandonne l'arbre.
    pub fn parse_device_description(&mut self, xml: &str) -> Result<DeviceId, XmlError> {
        debug!("Parsing device description ({} bytes)", xml.len());

        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        read_device(self, &mut reader)
    }
}

/// Lit le prochain élément `device` du flux, en descendant dans le document
/// si le lecteur n'y est pas déjà positionné, et construit le sous-arbre
/// correspondant.
///
/// # Errors
///
/// [`XmlError::MissingDeviceElement`] si le flux se termine sans élément
/// `device`.
pub fn read_device<R: BufRead>(
    tree: &mut DeviceTree,
    reader: &mut Reader<R>,
) -> Result<DeviceId, XmlError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"device" => {
                let enabled = enabled_attribute(&e);
                let device = tree.new_device();
                tree.device_mut(device).set_enabled(enabled);
                read_device_body(tree, reader, device)?;
                return Ok(device);
            }
            Event::Eof => return Err(XmlError::MissingDeviceElement),
            _ => {}
        }
        buf.clear();
    }
}

/// Contenu d'un élément `device` : propriétés plates et listes d'enfants.
fn read_device_body<R: BufRead>(
    tree: &mut DeviceTree,
    reader: &mut Reader<R>,
    device: DeviceId,
) -> Result<(), XmlError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = local_name_of(&e);
                match name.as_str() {
                    "deviceList" => read_device_list(tree, reader, device)?,
                    "serviceList" => read_service_list(tree, reader, device)?,
                    "iconList" => read_icon_list(tree, reader, device)?,
                    _ => {
                        let value = read_element_text(reader, &name)?;
                        tree.device_mut(device)
                            .properties_mut()
                            .set_if_absent(name, value);
                    }
                }
            }
            Event::Empty(e) => {
                let name = local_name_of(&e);
                match name.as_str() {
                    // Une liste vide n'est pas une propriété
                    "deviceList" | "serviceList" | "iconList" => {}
                    _ => {
                        tree.device_mut(device)
                            .properties_mut()
                            .set_if_absent(name, String::new());
                    }
                }
            }
            Event::End(_) => return Ok(()),
            Event::Eof => return Err(XmlError::Truncated("device".to_string())),
            _ => {}
        }
        buf.clear();
    }
}

/// Séquence homogène d'éléments `device` sous `deviceList`.
fn read_device_list<R: BufRead>(
    tree: &mut DeviceTree,
    reader: &mut Reader<R>,
    parent: DeviceId,
) -> Result<(), XmlError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"device" => {
                let enabled = enabled_attribute(&e);
                let child = tree.new_device();
                tree.device_mut(child).set_enabled(enabled);
                read_device_body(tree, reader, child)?;
                tree.add_child_device(parent, child)?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"device" => {
                let enabled = enabled_attribute(&e);
                let child = tree.new_device();
                tree.device_mut(child).set_enabled(enabled);
                tree.add_child_device(parent, child)?;
            }
            Event::Start(e) | Event::Empty(e) => {
                return Err(XmlError::UnexpectedElement(local_name_of(&e), "deviceList"));
            }
            Event::End(_) => return Ok(()),
            Event::Eof => return Err(XmlError::Truncated("deviceList".to_string())),
            _ => {}
        }
        buf.clear();
    }
}

/// Séquence homogène d'éléments `service` sous `serviceList`.
fn read_service_list<R: BufRead>(
    tree: &mut DeviceTree,
    reader: &mut Reader<R>,
    owner: DeviceId,
) -> Result<(), XmlError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"service" => {
                let service = tree.new_service();
                read_leaf_body(reader, tree.service_mut(service).properties_mut(), "service")?;
                tree.add_service(owner, service)?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"service" => {
                let service = tree.new_service();
                tree.add_service(owner, service)?;
            }
            Event::Start(e) | Event::Empty(e) => {
                return Err(XmlError::UnexpectedElement(local_name_of(&e), "serviceList"));
            }
            Event::End(_) => return Ok(()),
            Event::Eof => return Err(XmlError::Truncated("serviceList".to_string())),
            _ => {}
        }
        buf.clear();
    }
}

/// Séquence homogène d'éléments `icon` sous `iconList`.
fn read_icon_list<R: BufRead>(
    tree: &mut DeviceTree,
    reader: &mut Reader<R>,
    owner: DeviceId,
) -> Result<(), XmlError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"icon" => {
                let icon = tree.new_icon();
                read_leaf_body(reader, tree.icon_mut(icon).properties_mut(), "icon")?;
                tree.add_icon(owner, icon)?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"icon" => {
                let icon = tree.new_icon();
                tree.add_icon(owner, icon)?;
            }
            Event::Start(e) | Event::Empty(e) => {
                return Err(XmlError::UnexpectedElement(local_name_of(&e), "iconList"));
            }
            Event::End(_) => return Ok(()),
            Event::Eof => return Err(XmlError::Truncated("iconList".to_string())),
            _ => {}
        }
        buf.clear();
    }
}

/// Propriétés plates d'un élément `service` ou `icon`.
fn read_leaf_body<R: BufRead>(
    reader: &mut Reader<R>,
    bag: &mut PropertyBag,
    element: &'static str,
) -> Result<(), XmlError> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = local_name_of(&e);
                let value = read_element_text(reader, &name)?;
                bag.set_if_absent(name, value);
            }
            Event::Empty(e) => {
                bag.set_if_absent(local_name_of(&e), String::new());
            }
            Event::End(_) => return Ok(()),
            Event::Eof => return Err(XmlError::Truncated(element.to_string())),
            _ => {}
        }
        buf.clear();
    }
}

/// Contenu texte d'un élément plat ; le balisage imbriqué est sauté.
fn read_element_text<R: BufRead>(
    reader: &mut Reader<R>,
    element: &str,
) -> Result<String, XmlError> {
    let mut buf = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.decode()?),
            Event::Start(nested) => {
                let end = nested.to_end().into_owned();
                let mut skipped = Vec::new();
                reader.read_to_end_into(end.name(), &mut skipped)?;
            }
            Event::End(_) => return Ok(text),
            Event::Eof => return Err(XmlError::Truncated(element.to_string())),
            _ => {}
        }
        buf.clear();
    }
}

fn local_name_of(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Attribut `enabled` d'un élément `device` ; absent vaut activé.
fn enabled_attribute(e: &BytesStart) -> bool {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == b"enabled")
        .map(|attr| attr.value.as_ref() != b"false")
        .unwrap_or(true)
}
