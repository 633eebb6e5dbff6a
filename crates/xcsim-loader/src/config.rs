//! System topology construction from the container's configuration sector.

use xcsim_core::{Core, NodeKind, SystemState};
use xcsim_isa::IsaVariant;

use crate::xml::{parse, Element};
use crate::LoaderError;

pub const DEFAULT_RAM_BASE: u32 = 0x10000;
pub const DEFAULT_RAM_SIZE: u32 = 0x10000;

/// JTAG identifiers of second-generation parts; everything else is treated
/// as XS1-B.
const XS2_JTAG_IDS: &[u32] = &[0x0633, 0x0733];

fn parse_number(text: &str) -> Result<u32, LoaderError> {
    let text = text.trim();
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        text.parse()
    };
    parsed.map_err(|_| LoaderError::Config(format!("invalid number {text:?}")))
}

fn number_attribute(element: &Element, name: &str) -> Result<u32, LoaderError> {
    let value = element
        .attribute(name)
        .ok_or_else(|| LoaderError::Config(format!("<{}> missing {name:?}", element.name)))?;
    parse_number(value)
}

fn find_descendant<'a>(element: &'a Element, name: &str) -> Option<&'a Element> {
    if element.name == name {
        return Some(element);
    }
    element.children.iter().find_map(|c| find_descendant(c, name))
}

fn core_from_config(config: &Element, variant: IsaVariant) -> Result<Core, LoaderError> {
    let mut ram_base = DEFAULT_RAM_BASE;
    let mut ram_size = DEFAULT_RAM_SIZE;
    if let Some(ram) =
        config.child("MemoryController").and_then(|mc| mc.child("Ram"))
    {
        ram_base = number_attribute(ram, "base")?;
        ram_size = number_attribute(ram, "size")?;
    }
    if !ram_size.is_power_of_two() {
        return Err(LoaderError::Config(format!("ram size {ram_size:#x} is not a power of two")));
    }
    if ram_base % ram_size != 0 {
        return Err(LoaderError::Config(format!(
            "ram base {ram_base:#x} is not a multiple of ram size {ram_size:#x}"
        )));
    }
    let mut core = Core::new(ram_base, ram_size, variant);
    core.core_number = number_attribute(config, "number")?;
    if let Some(reference) = config.attribute("codeReference") {
        core.code_reference = reference.to_string();
    }
    Ok(core)
}

fn parse_xlink_end(value: &str) -> Result<(u32, usize), LoaderError> {
    let (node, link) = value
        .split_once(',')
        .ok_or_else(|| LoaderError::Config(format!("malformed link end {value:?}")))?;
    Ok((parse_number(node)?, parse_number(link)? as usize))
}

/// Build the system described by a configuration sector.
pub fn system_from_config(text: &str) -> Result<SystemState, LoaderError> {
    let root = parse(text)?;
    let system = find_descendant(&root, "System").unwrap_or(&root);
    let nodes_element = find_descendant(system, "Nodes")
        .ok_or(LoaderError::Config("no <Nodes> in configuration".to_string()))?;

    let mut sys = SystemState::new();
    // Configuration node number to node index.
    let mut number_map = std::collections::HashMap::new();

    for child in &nodes_element.children {
        match child.name.as_str() {
            "Node" => {
                let jtag_id = number_attribute(child, "jtagId")?;
                let number = number_attribute(child, "number")?;
                let variant = if XS2_JTAG_IDS.contains(&jtag_id) {
                    IsaVariant::Xs2A
                } else {
                    IsaVariant::Xs1B
                };
                let num_xlinks = child
                    .child("Switch")
                    .and_then(|s| s.attribute("sLinks"))
                    .map(parse_number)
                    .transpose()?
                    .unwrap_or(0) as usize;
                let node = sys.add_node(NodeKind::Processor, num_xlinks);
                sys.nodes[node].id = number & 0xffff;
                number_map.insert(number, node);
                for processor in child.children_named("Processor") {
                    let mut core = core_from_config(processor, variant)?;
                    core.variant = variant;
                    sys.add_core(node, core);
                }
            }
            "GlxNode" => {
                let number = number_attribute(child, "number")?;
                let node = sys.add_node(NodeKind::Peripheral, 1);
                sys.nodes[node].id = number & 0xffff;
                number_map.insert(number, node);
            }
            _ => {}
        }
    }
    if sys.nodes.is_empty() {
        return Err(LoaderError::Config("configuration declares no nodes".to_string()));
    }

    if let Some(connections) = find_descendant(system, "Connections") {
        for slink in connections.children_named("SLink") {
            let end1 = slink
                .attribute("end1")
                .ok_or(LoaderError::Config("<SLink> missing end1".to_string()))?;
            let end2 = slink
                .attribute("end2")
                .ok_or(LoaderError::Config("<SLink> missing end2".to_string()))?;
            let (node1, link1) = parse_xlink_end(end1)?;
            let (node2, link2) = parse_xlink_end(end2)?;
            let n1 = *number_map
                .get(&node1)
                .ok_or_else(|| LoaderError::Config(format!("no node numbered {node1}")))?;
            let n2 = *number_map
                .get(&node2)
                .ok_or_else(|| LoaderError::Config(format!("no node numbered {node2}")))?;
            if link1 >= sys.nodes[n1].xlinks.len() || link2 >= sys.nodes[n2].xlinks.len() {
                return Err(LoaderError::Config(format!("link out of range on {node1},{node2}")));
            }
            sys.connect_xlinks(n1, link1, n2, link2);
        }
    }

    if let Some(jtag) = find_descendant(system, "JtagChain") {
        for (index, node) in jtag.children_named("Node").enumerate() {
            let id = number_attribute(node, "id")?;
            if let Some(&n) = number_map.get(&id) {
                sys.nodes[n].jtag_index = index as u32;
            }
        }
    } else {
        for (index, node) in sys.nodes.iter_mut().enumerate() {
            node.jtag_index = index as u32;
        }
    }

    Ok(sys)
}

/// Fallback system for images without a configuration sector: one node,
/// one core.
pub fn default_system() -> SystemState {
    let mut sys = SystemState::new();
    let node = sys.add_node(NodeKind::Processor, 0);
    sys.add_core(node, Core::new(DEFAULT_RAM_BASE, DEFAULT_RAM_SIZE, IsaVariant::Xs1B));
    sys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_two_node_system() {
        let text = r#"
            <Config>
              <System>
                <Nodes>
                  <Node jtagId="0x2731" number="0">
                    <Switch sLinks="2"/>
                    <Processor number="0" codeReference="tile[0]">
                      <MemoryController><Ram base="0x10000" size="0x10000"/></MemoryController>
                    </Processor>
                  </Node>
                  <Node jtagId="0x2731" number="1">
                    <Switch sLinks="2"/>
                    <Processor number="0"/>
                  </Node>
                </Nodes>
                <Connections>
                  <SLink end1="0,0" end2="1,1"/>
                </Connections>
                <JtagChain>
                  <Node id="0"/>
                  <Node id="1"/>
                </JtagChain>
              </System>
            </Config>"#;
        let sys = system_from_config(text).unwrap();
        assert_eq!(sys.nodes.len(), 2);
        assert_eq!(sys.cores.len(), 2);
        assert_eq!(sys.nodes[0].xlinks[0].dest, Some((1, 1)));
        assert_eq!(sys.nodes[1].xlinks[1].dest, Some((0, 0)));
        assert_eq!(sys.cores[0].code_reference, "tile[0]");
        assert_eq!(sys.nodes[1].jtag_index, 1);
    }

    #[test]
    fn rejects_bad_ram_geometry() {
        let text = r#"
            <Config><System><Nodes>
              <Node jtagId="0" number="0">
                <Processor number="0">
                  <MemoryController><Ram base="0x10000" size="0xc000"/></MemoryController>
                </Processor>
              </Node>
            </Nodes></System></Config>"#;
        assert!(system_from_config(text).is_err());
    }
}
