//! CIB Parsing
//!
//! Reads the declarative configuration document returned by
//! `cibadmin --query` into an owned [`CibSnapshot`].

use crate::domain::cluster::{CibNode, CibPrimitive, CibSnapshot, LocationConstraint};
use crate::error::{Error, Result};
use roxmltree::{Document, Node};
use std::collections::BTreeMap;

/// Parse a full CIB document
pub fn parse_cib(xml: &str) -> Result<CibSnapshot> {
    let doc = Document::parse(xml).map_err(|e| Error::CibParse(e.to_string()))?;
    let root = doc.root_element();
    if !root.has_tag_name("cib") {
        return Err(Error::CibParse(format!(
            "expected <cib> root, found <{}>",
            root.tag_name().name()
        )));
    }

    let mut snapshot = CibSnapshot {
        dc_uuid: root.attribute("dc-uuid").map(str::to_string),
        ..Default::default()
    };

    let Some(configuration) = child(root, "configuration") else {
        return Ok(snapshot);
    };

    if let Some(nodes) = child(configuration, "nodes") {
        snapshot.nodes = nodes
            .children()
            .filter(|n| n.has_tag_name("node"))
            .filter_map(|n| {
                Some(CibNode {
                    id: n.attribute("id")?.to_string(),
                    uname: n.attribute("uname")?.to_string(),
                })
            })
            .collect();
    }

    if let Some(resources) = child(configuration, "resources") {
        for node in resources.children().filter(Node::is_element) {
            match node.tag_name().name() {
                "primitive" => snapshot.primitives.extend(parse_primitive(node, None)),
                "group" => {
                    let group = node.attribute("id");
                    snapshot.primitives.extend(
                        node.children()
                            .filter(|n| n.has_tag_name("primitive"))
                            .filter_map(|n| parse_primitive(n, group)),
                    );
                }
                _ => {}
            }
        }
    }

    if let Some(constraints) = child(configuration, "constraints") {
        // Rule-based locations carry no node attribute and are not pins
        snapshot.locations = constraints
            .children()
            .filter(|n| n.has_tag_name("rsc_location"))
            .filter_map(|n| {
                Some(LocationConstraint {
                    id: n.attribute("id")?.to_string(),
                    rsc: n.attribute("rsc")?.to_string(),
                    node: n.attribute("node")?.to_string(),
                    score: n.attribute("score").unwrap_or("0").to_string(),
                })
            })
            .collect();
    }

    Ok(snapshot)
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn parse_primitive(node: Node, group: Option<&str>) -> Option<CibPrimitive> {
    let params: BTreeMap<String, String> = node
        .children()
        .filter(|n| n.has_tag_name("instance_attributes"))
        .flat_map(|attrs| attrs.children().filter(|n| n.has_tag_name("nvpair")))
        .filter_map(|nv| Some((nv.attribute("name")?.to_string(), nv.attribute("value")?.to_string())))
        .collect();

    Some(CibPrimitive {
        id: node.attribute("id")?.to_string(),
        class: node.attribute("class").unwrap_or_default().to_string(),
        provider: node.attribute("provider").unwrap_or_default().to_string(),
        kind: node.attribute("type").unwrap_or_default().to_string(),
        params,
        group: group.map(str::to_string),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::target::AgentType;
    use assert_matches::assert_matches;

    pub(crate) const CIB: &str = r#"<cib dc-uuid="2" epoch="42" num_updates="0" admin_epoch="0">
  <configuration>
    <crm_config/>
    <nodes>
      <node id="1" uname="oss1"/>
      <node id="2" uname="oss2"/>
    </nodes>
    <resources>
      <primitive id="MGS_424f74" class="ocf" provider="chroma" type="Target">
        <instance_attributes id="MGS_424f74-instance_attributes">
          <nvpair id="MGS_424f74-instance_attributes-target" name="target" value="a8d2-4e1f"/>
        </instance_attributes>
      </primitive>
      <group id="group-fs-OST0000">
        <primitive id="fs-OST0000-zfs" class="ocf" provider="chroma" type="ZFS">
          <instance_attributes id="fs-OST0000-zfs-instance_attributes">
            <nvpair id="fs-OST0000-zfs-instance_attributes-pool" name="pool" value="ostpool"/>
          </instance_attributes>
        </primitive>
        <primitive id="fs-OST0000" class="ocf" provider="lustre" type="Lustre">
          <instance_attributes id="fs-OST0000-instance_attributes">
            <nvpair id="fs-OST0000-instance_attributes-target" name="target" value="ostpool/ost0"/>
            <nvpair id="fs-OST0000-instance_attributes-mountpoint" name="mountpoint" value="/mnt/ost0"/>
          </instance_attributes>
        </primitive>
      </group>
      <primitive id="st-fencing" class="stonith" type="fence_chroma"/>
    </resources>
    <constraints>
      <rsc_location id="MGS_424f74-primary" rsc="MGS_424f74" node="oss1" score="20"/>
      <rsc_location id="MGS_424f74-secondary" rsc="MGS_424f74" node="oss2" score="10"/>
      <rsc_location id="fs-OST0000-primary" rsc="fs-OST0000" node="oss2" score="20"/>
      <rsc_location id="ping-rule" rsc="fs-OST0000"><rule id="r1" score="-INFINITY"/></rsc_location>
    </constraints>
  </configuration>
  <status/>
</cib>"#;

    #[test]
    fn test_parse_cib() {
        let cib = parse_cib(CIB).unwrap();

        assert_eq!(cib.dc_node(), Some("oss2"));
        assert_eq!(cib.primitives.len(), 4);

        let zfs = cib.primitive("fs-OST0000-zfs").unwrap();
        assert!(zfs.is_agent(&AgentType::ZFS));
        assert_eq!(zfs.group.as_deref(), Some("group-fs-OST0000"));
        assert_eq!(zfs.params.get("pool").map(String::as_str), Some("ostpool"));

        let lustre = cib.primitive("fs-OST0000").unwrap();
        assert_eq!(lustre.params.get("mountpoint").map(String::as_str), Some("/mnt/ost0"));

        let fencing = cib.primitive("st-fencing").unwrap();
        assert_eq!(fencing.provider, "");

        assert_eq!(cib.locations.len(), 3);
        assert_eq!(cib.location("MGS_424f74-secondary").unwrap().node, "oss2");
        assert_eq!(cib.target_labels(), vec!["MGS_424f74", "fs-OST0000"]);
        assert_eq!(cib.legacy_targets()[0].uuid, "a8d2-4e1f");
    }

    #[test]
    fn test_parse_minimal_cib() {
        let cib = parse_cib("<cib><configuration/></cib>").unwrap();
        assert_eq!(cib, CibSnapshot::default());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_matches!(parse_cib("not xml"), Err(Error::CibParse(_)));
        assert_matches!(parse_cib("<crm_mon/>"), Err(Error::CibParse(_)));
    }
}
