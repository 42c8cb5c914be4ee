//! Arbre de devices UPnP.
//!
//! Tous les nœuds (devices, services, icônes, contextes racine) vivent dans
//! une arène possédée par [`DeviceTree`] ; les références parent / racine
//! sont des index, câblés exclusivement par les hooks des collections
//! d'appartenance. Un identifiant n'est valable que pour l'arène qui l'a
//! créé : l'indexer dans une autre arène aboutit à un nœud arbitraire ou à
//! un panic.
//!
//! Les mutations structurelles exigent `&mut DeviceTree`, ce qui reporte
//! l'exclusion mutuelle sur l'appelant ; les traversées en lecture seule
//! peuvent se partager librement.

use std::fmt;

use super::bag::PropertyBag;
use super::collection::{CollectionHooks, HookedCollection};
use super::errors::{TreeError, TypeError};
use super::types::{UniqueDeviceName, UpnpType};

/// Identifiant d'un device dans l'arène.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub(crate) usize);

/// Identifiant d'un service dans l'arène.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceId(pub(crate) usize);

/// Identifiant d'une icône dans l'arène.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IconId(pub(crate) usize);

/// Identifiant d'un contexte racine dans l'arène.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RootId(pub(crate) usize);

/// Sens d'un événement d'attachement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEventKind {
    Added,
    Removed,
}

/// Événement émis lors d'un attachement ou d'un détachement de device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeEvent {
    pub kind: TreeEventKind,
    pub device: DeviceId,
}

type Observer = Box<dyn Fn(&TreeEvent) + Send + Sync>;

/// Device UPnP : sac de propriétés, sous-devices, services et icônes.
///
/// Les accesseurs typés lisent et écrivent à travers le sac, qui reste la
/// seule source de vérité ; les accesseurs texte retournent `""` quand la
/// propriété est absente.
pub struct Device {
    properties: PropertyBag,
    enabled: bool,
    devices: HookedCollection<DeviceId>,
    services: HookedCollection<ServiceId>,
    icons: HookedCollection<IconId>,
    parent: Option<DeviceId>,
    root: Option<RootId>,
    observers: Vec<Observer>,
}

impl Device {
    fn new() -> Self {
        Self {
            properties: PropertyBag::new(),
            enabled: true,
            devices: HookedCollection::new(),
            services: HookedCollection::new(),
            icons: HookedCollection::new(),
            parent: None,
            root: None,
            observers: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Device contenant, `None` pour un device racine ou détaché.
    pub fn parent(&self) -> Option<DeviceId> {
        self.parent
    }

    /// Contexte racine de l'arbre d'appartenance, `None` si détaché.
    pub fn root(&self) -> Option<RootId> {
        self.root
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    /// Accès en écriture au sac. N'affecte jamais la structure de l'arbre.
    pub fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.properties
    }

    /// Sous-devices, dans l'ordre d'insertion.
    pub fn devices(&self) -> &HookedCollection<DeviceId> {
        &self.devices
    }

    /// Services, dans l'ordre d'insertion.
    pub fn services(&self) -> &HookedCollection<ServiceId> {
        &self.services
    }

    /// Icônes, dans l'ordre d'insertion.
    pub fn icons(&self) -> &HookedCollection<IconId> {
        &self.icons
    }

    /// Type de device structuré, parsé depuis la propriété `deviceType`.
    pub fn device_type(&self) -> Result<UpnpType, TypeError> {
        self.properties
            .get("deviceType")
            .ok_or(TypeError::MissingProperty("deviceType"))?
            .parse()
    }

    /// Écrit la propriété `deviceType` sous sa forme URN.
    pub fn set_device_type(&mut self, device_type: &UpnpType) {
        self.properties.set("deviceType", device_type.to_string());
    }

    /// Nom unique structuré, parsé depuis la propriété `UDN`.
    pub fn udn(&self) -> Result<UniqueDeviceName, TypeError> {
        self.properties
            .get("UDN")
            .ok_or(TypeError::MissingProperty("UDN"))?
            .parse()
    }

    /// Écrit la propriété `UDN` sous sa forme `uuid:<valeur>`.
    pub fn set_udn(&mut self, udn: &UniqueDeviceName) {
        self.properties.set("UDN", udn.to_string());
    }

    pub fn friendly_name(&self) -> &str {
        self.property("friendlyName")
    }

    pub fn set_friendly_name(&mut self, value: impl Into<String>) {
        self.properties.set("friendlyName", value);
    }

    pub fn manufacturer(&self) -> &str {
        self.property("manufacturer")
    }

    pub fn set_manufacturer(&mut self, value: impl Into<String>) {
        self.properties.set("manufacturer", value);
    }

    pub fn manufacturer_url(&self) -> &str {
        self.property("manufacturerURL")
    }

    pub fn set_manufacturer_url(&mut self, value: impl Into<String>) {
        self.properties.set("manufacturerURL", value);
    }

    pub fn model_description(&self) -> &str {
        self.property("modelDescription")
    }

    pub fn set_model_description(&mut self, value: impl Into<String>) {
        self.properties.set("modelDescription", value);
    }

    pub fn model_name(&self) -> &str {
        self.property("modelName")
    }

    pub fn set_model_name(&mut self, value: impl Into<String>) {
        self.properties.set("modelName", value);
    }

    pub fn model_number(&self) -> &str {
        self.property("modelNumber")
    }

    pub fn set_model_number(&mut self, value: impl Into<String>) {
        self.properties.set("modelNumber", value);
    }

    pub fn model_url(&self) -> &str {
        self.property("modelURL")
    }

    pub fn set_model_url(&mut self, value: impl Into<String>) {
        self.properties.set("modelURL", value);
    }

    pub fn serial_number(&self) -> &str {
        self.property("serialNumber")
    }

    pub fn set_serial_number(&mut self, value: impl Into<String>) {
        self.properties.set("serialNumber", value);
    }

    pub fn upc(&self) -> &str {
        self.property("UPC")
    }

    pub fn set_upc(&mut self, value: impl Into<String>) {
        self.properties.set("UPC", value);
    }

    fn property(&self, key: &str) -> &str {
        self.properties.get(key).unwrap_or("")
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.property("deviceType"),
            self.property("UDN")
        )
    }
}

/// Service UPnP : feuille avec sac de propriétés et référence arrière vers
/// son device.
pub struct Service {
    properties: PropertyBag,
    device: Option<DeviceId>,
}

impl Service {
    fn new() -> Self {
        Self {
            properties: PropertyBag::new(),
            device: None,
        }
    }

    /// Device propriétaire, `None` si le service est détaché.
    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.properties
    }

    /// Type de service structuré, parsé depuis la propriété `serviceType`.
    pub fn service_type(&self) -> Result<UpnpType, TypeError> {
        self.properties
            .get("serviceType")
            .ok_or(TypeError::MissingProperty("serviceType"))?
            .parse()
    }

    pub fn set_service_type(&mut self, service_type: &UpnpType) {
        self.properties.set("serviceType", service_type.to_string());
    }

    pub fn service_id(&self) -> &str {
        self.property("serviceId")
    }

    pub fn set_service_id(&mut self, value: impl Into<String>) {
        self.properties.set("serviceId", value);
    }

    pub fn scpd_url(&self) -> &str {
        self.property("SCPDURL")
    }

    pub fn set_scpd_url(&mut self, value: impl Into<String>) {
        self.properties.set("SCPDURL", value);
    }

    pub fn control_url(&self) -> &str {
        self.property("controlURL")
    }

    pub fn set_control_url(&mut self, value: impl Into<String>) {
        self.properties.set("controlURL", value);
    }

    pub fn event_sub_url(&self) -> &str {
        self.property("eventSubURL")
    }

    pub fn set_event_sub_url(&mut self, value: impl Into<String>) {
        self.properties.set("eventSubURL", value);
    }

    fn property(&self, key: &str) -> &str {
        self.properties.get(key).unwrap_or("")
    }
}

/// Icône UPnP : feuille avec sac de propriétés et référence arrière vers
/// son device.
pub struct Icon {
    properties: PropertyBag,
    device: Option<DeviceId>,
}

impl Icon {
    fn new() -> Self {
        Self {
            properties: PropertyBag::new(),
            device: None,
        }
    }

    /// Device propriétaire, `None` si l'icône est détachée.
    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.properties
    }

    pub fn mimetype(&self) -> &str {
        self.property("mimetype")
    }

    pub fn set_mimetype(&mut self, value: impl Into<String>) {
        self.properties.set("mimetype", value);
    }

    pub fn width(&self) -> &str {
        self.property("width")
    }

    pub fn set_width(&mut self, value: impl Into<String>) {
        self.properties.set("width", value);
    }

    pub fn height(&self) -> &str {
        self.property("height")
    }

    pub fn set_height(&mut self, value: impl Into<String>) {
        self.properties.set("height", value);
    }

    pub fn depth(&self) -> &str {
        self.property("depth")
    }

    pub fn set_depth(&mut self, value: impl Into<String>) {
        self.properties.set("depth", value);
    }

    pub fn url(&self) -> &str {
        self.property("url")
    }

    pub fn set_url(&mut self, value: impl Into<String>) {
        self.properties.set("url", value);
    }

    fn property(&self, key: &str) -> &str {
        self.properties.get(key).unwrap_or("")
    }
}

/// Contexte racine d'un arbre de devices.
///
/// Tous les devices d'un même arbre y renvoient ; c'est le point
/// d'abonnement unique aux entrées et sorties de devices, directes ou
/// profondes.
pub struct Root {
    root_device: Option<DeviceId>,
    observers: Vec<Observer>,
}

impl Root {
    fn new() -> Self {
        Self {
            root_device: None,
            observers: Vec::new(),
        }
    }

    /// Device racine de l'arbre, `None` tant qu'aucun n'a été désigné.
    pub fn root_device(&self) -> Option<DeviceId> {
        self.root_device
    }
}

/// Arène possédant tous les nœuds du modèle.
#[derive(Default)]
pub struct DeviceTree {
    devices: Vec<Device>,
    services: Vec<Service>,
    icons: Vec<Icon>,
    roots: Vec<Root>,
}

/// Hooks de câblage pour la collection de sous-devices d'un device.
struct ChildDeviceHooks<'a> {
    tree: &'a mut DeviceTree,
    parent: DeviceId,
}

impl CollectionHooks<DeviceId> for ChildDeviceHooks<'_> {
    fn on_attach(&mut self, child: DeviceId) {
        let parent_root = self.tree.devices[self.parent.0].root;
        self.tree.devices[child.0].parent = Some(self.parent);
        self.tree.notify_device(
            child,
            TreeEvent {
                kind: TreeEventKind::Added,
                device: child,
            },
        );
        self.tree.set_root(child, parent_root);
    }

    fn on_detach(&mut self, child: DeviceId) {
        self.tree.notify_device(
            child,
            TreeEvent {
                kind: TreeEventKind::Removed,
                device: child,
            },
        );
        self.tree.set_root(child, None);
        self.tree.devices[child.0].parent = None;
    }
}

/// Hooks de câblage pour la collection de services d'un device.
struct ServiceHooks<'a> {
    tree: &'a mut DeviceTree,
    owner: DeviceId,
}

impl CollectionHooks<ServiceId> for ServiceHooks<'_> {
    fn on_attach(&mut self, service: ServiceId) {
        self.tree.services[service.0].device = Some(self.owner);
    }

    fn on_detach(&mut self, service: ServiceId) {
        self.tree.services[service.0].device = None;
    }
}

/// Hooks de câblage pour la collection d'icônes d'un device.
struct IconHooks<'a> {
    tree: &'a mut DeviceTree,
    owner: DeviceId,
}

impl CollectionHooks<IconId> for IconHooks<'_> {
    fn on_attach(&mut self, icon: IconId) {
        self.tree.icons[icon.0].device = Some(self.owner);
    }

    fn on_detach(&mut self, icon: IconId) {
        self.tree.icons[icon.0].device = None;
    }
}

impl DeviceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Crée un device détaché : sans parent, sans racine, activé, sac et
    /// collections vides.
    pub fn new_device(&mut self) -> DeviceId {
        self.devices.push(Device::new());
        DeviceId(self.devices.len() - 1)
    }

    /// Crée un service détaché.
    pub fn new_service(&mut self) -> ServiceId {
        self.services.push(Service::new());
        ServiceId(self.services.len() - 1)
    }

    /// Crée une icône détachée.
    pub fn new_icon(&mut self) -> IconId {
        self.icons.push(Icon::new());
        IconId(self.icons.len() - 1)
    }

    /// Crée un contexte racine sans device racine désigné.
    pub fn new_root(&mut self) -> RootId {
        self.roots.push(Root::new());
        RootId(self.roots.len() - 1)
    }

    pub fn device(&self, id: DeviceId) -> &Device {
        &self.devices[id.0]
    }

    pub fn device_mut(&mut self, id: DeviceId) -> &mut Device {
        &mut self.devices[id.0]
    }

    pub fn service(&self, id: ServiceId) -> &Service {
        &self.services[id.0]
    }

    pub fn service_mut(&mut self, id: ServiceId) -> &mut Service {
        &mut self.services[id.0]
    }

    pub fn icon(&self, id: IconId) -> &Icon {
        &self.icons[id.0]
    }

    pub fn icon_mut(&mut self, id: IconId) -> &mut Icon {
        &mut self.icons[id.0]
    }

    pub fn root(&self, id: RootId) -> &Root {
        &self.roots[id.0]
    }

    /// Abonne `observer` aux événements d'attachement de ce device.
    pub fn observe_device<F>(&mut self, id: DeviceId, observer: F)
    where
        F: Fn(&TreeEvent) + Send + Sync + 'static,
    {
        self.devices[id.0].observers.push(Box::new(observer));
    }

    /// Abonne `observer` aux entrées/sorties de devices sur tout l'arbre de
    /// ce contexte racine.
    pub fn observe_root<F>(&mut self, id: RootId, observer: F)
    where
        F: Fn(&TreeEvent) + Send + Sync + 'static,
    {
        self.roots[id.0].observers.push(Box::new(observer));
    }

    /// Désigne le device racine d'un contexte.
    ///
    /// Le device doit être sans parent ; l'éventuel device racine précédent
    /// du contexte est détaché (son sous-arbre perd sa racine, avec
    /// notifications). Re-désigner le device déjà en place est sans effet.
    pub fn set_root_device(&mut self, root: RootId, device: DeviceId) -> Result<(), TreeError> {
        if self.roots[root.0].root_device == Some(device) {
            return Ok(());
        }
        if self.devices[device.0].parent.is_some() {
            return Err(TreeError::AlreadyAttached);
        }

        if let Some(previous) = self.roots[root.0].root_device.take() {
            self.set_root(previous, None);
        }

        // Si le device était la racine d'un autre contexte, l'en délier
        if let Some(other) = self.devices[device.0].root {
            self.roots[other.0].root_device = None;
        }

        self.roots[root.0].root_device = Some(device);
        self.set_root(device, Some(root));
        Ok(())
    }

    /// Ajoute `child` aux sous-devices de `parent`.
    ///
    /// Refusé si `child` a déjà un parent, ou si l'attachement créerait un
    /// cycle. L'attachement câble parent et racine (récursivement sur tout
    /// le sous-arbre de `child`) et déclenche les notifications.
    pub fn add_child_device(&mut self, parent: DeviceId, child: DeviceId) -> Result<(), TreeError> {
        if child == parent || self.has_ancestor(parent, child) {
            return Err(TreeError::WouldCycle);
        }
        if self.devices[child.0].parent.is_some() {
            return Err(TreeError::AlreadyAttached);
        }

        let mut children = std::mem::take(&mut self.devices[parent.0].devices);
        let result = children.add(&mut ChildDeviceHooks { tree: &mut *self, parent }, child);
        self.devices[parent.0].devices = children;
        result
    }

    /// Retire `child` des sous-devices de `parent`.
    ///
    /// Le device emporte tout son sous-arbre : sa racine et celle de ses
    /// descendants sont invalidées. Sans effet (retourne `false`) si
    /// `child` n'y figure pas.
    pub fn remove_child_device(&mut self, parent: DeviceId, child: DeviceId) -> bool {
        let mut children = std::mem::take(&mut self.devices[parent.0].devices);
        let removed = children.remove(&mut ChildDeviceHooks { tree: &mut *self, parent }, child);
        self.devices[parent.0].devices = children;
        removed
    }

    /// Détache tous les sous-devices de `parent`, dans l'ordre d'insertion.
    pub fn clear_child_devices(&mut self, parent: DeviceId) {
        let mut children = std::mem::take(&mut self.devices[parent.0].devices);
        children.clear(&mut ChildDeviceHooks { tree: &mut *self, parent });
        self.devices[parent.0].devices = children;
    }

    /// Ajoute `service` aux services de `device`.
    pub fn add_service(&mut self, device: DeviceId, service: ServiceId) -> Result<(), TreeError> {
        if self.services[service.0].device.is_some() {
            return Err(TreeError::AlreadyAttached);
        }

        let mut services = std::mem::take(&mut self.devices[device.0].services);
        let result = services.add(&mut ServiceHooks { tree: &mut *self, owner: device }, service);
        self.devices[device.0].services = services;
        result
    }

    /// Retire `service` des services de `device` ; `false` s'il n'y est pas.
    pub fn remove_service(&mut self, device: DeviceId, service: ServiceId) -> bool {
        let mut services = std::mem::take(&mut self.devices[device.0].services);
        let removed = services.remove(&mut ServiceHooks { tree: &mut *self, owner: device }, service);
        self.devices[device.0].services = services;
        removed
    }

    /// Détache tous les services de `device`.
    pub fn clear_services(&mut self, device: DeviceId) {
        let mut services = std::mem::take(&mut self.devices[device.0].services);
        services.clear(&mut ServiceHooks { tree: &mut *self, owner: device });
        self.devices[device.0].services = services;
    }

    /// Ajoute `icon` aux icônes de `device`.
    pub fn add_icon(&mut self, device: DeviceId, icon: IconId) -> Result<(), TreeError> {
        if self.icons[icon.0].device.is_some() {
            return Err(TreeError::AlreadyAttached);
        }

        let mut icons = std::mem::take(&mut self.devices[device.0].icons);
        let result = icons.add(&mut IconHooks { tree: &mut *self, owner: device }, icon);
        self.devices[device.0].icons = icons;
        result
    }

    /// Retire `icon` des icônes de `device` ; `false` si elle n'y est pas.
    pub fn remove_icon(&mut self, device: DeviceId, icon: IconId) -> bool {
        let mut icons = std::mem::take(&mut self.devices[device.0].icons);
        let removed = icons.remove(&mut IconHooks { tree: &mut *self, owner: device }, icon);
        self.devices[device.0].icons = icons;
        removed
    }

    /// Détache toutes les icônes de `device`.
    pub fn clear_icons(&mut self, device: DeviceId) {
        let mut icons = std::mem::take(&mut self.devices[device.0].icons);
        icons.clear(&mut IconHooks { tree: &mut *self, owner: device });
        self.devices[device.0].icons = icons;
    }

    /// Device racine de l'arbre auquel `device` appartient, `None` si le
    /// device est détaché.
    pub fn root_device_of(&self, device: DeviceId) -> Option<DeviceId> {
        let root = self.devices[device.0].root?;
        self.roots[root.0].root_device
    }

    /// Itère `start` puis tous ses descendants, profondeur d'abord, parents
    /// avant descendants. Chaque appel repart d'une traversée neuve ; la
    /// structure ne doit pas être modifiée pendant l'itération.
    pub fn enumerate_devices(&self, start: DeviceId) -> DeviceIter<'_> {
        DeviceIter {
            tree: self,
            stack: vec![start],
        }
    }

    /// Filtre l'énumération par égalité structurelle du type de device.
    ///
    /// Les devices sans propriété `deviceType` exploitable sont ignorés.
    pub fn find_by_device_type<'a>(
        &'a self,
        start: DeviceId,
        device_type: &'a UpnpType,
    ) -> impl Iterator<Item = DeviceId> + 'a {
        self.enumerate_devices(start)
            .filter(move |&id| match self.devices[id.0].device_type() {
                Ok(found) => found == *device_type,
                Err(_) => false,
            })
    }

    /// Tous les services du sous-arbre, dans l'ordre d'énumération des
    /// devices puis d'insertion des services.
    pub fn enumerate_services(&self, start: DeviceId) -> impl Iterator<Item = ServiceId> + '_ {
        self.enumerate_devices(start)
            .flat_map(move |id| self.devices[id.0].services.iter())
    }

    /// Propage une valeur de racine sur un sous-arbre, parents d'abord.
    ///
    /// Réassigner la valeur déjà en place est un non-événement : le
    /// court-circuit évite les notifications en double.
    fn set_root(&mut self, device: DeviceId, root: Option<RootId>) {
        if self.devices[device.0].root == root {
            return;
        }

        if let Some(old) = self.devices[device.0].root {
            self.notify_root(
                old,
                TreeEvent {
                    kind: TreeEventKind::Removed,
                    device,
                },
            );
        }

        self.devices[device.0].root = root;

        if let Some(new) = root {
            self.notify_root(
                new,
                TreeEvent {
                    kind: TreeEventKind::Added,
                    device,
                },
            );
        }

        let children: Vec<DeviceId> = self.devices[device.0].devices.iter().collect();
        for child in children {
            self.set_root(child, root);
        }
    }

    /// Vrai si `ancestor` figure sur la chaîne de parents de `device`.
    fn has_ancestor(&self, device: DeviceId, ancestor: DeviceId) -> bool {
        let mut current = device;
        while let Some(parent) = self.devices[current.0].parent {
            if parent == ancestor {
                return true;
            }
            current = parent;
        }
        false
    }

    fn notify_device(&self, device: DeviceId, event: TreeEvent) {
        for observer in &self.devices[device.0].observers {
            observer(&event);
        }
    }

    fn notify_root(&self, root: RootId, event: TreeEvent) {
        for observer in &self.roots[root.0].observers {
            observer(&event);
        }
    }
}

/// Itérateur paresseux de [`DeviceTree::enumerate_devices`].
pub struct DeviceIter<'a> {
    tree: &'a DeviceTree,
    stack: Vec<DeviceId>,
}

impl Iterator for DeviceIter<'_> {
    type Item = DeviceId;

    fn next(&mut self) -> Option<DeviceId> {
        let current = self.stack.pop()?;

        // Empilés en ordre inverse pour ressortir en ordre d'insertion
        let children = self.tree.devices[current.0].devices.as_slice();
        for &child in children.iter().rev() {
            self.stack.push(child);
        }

        Some(current)
    }
}
