// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `modelDescription.xml` loader.
//!
//! Reads the fields the adapter relies on from FMI 1.0, 2.0 and 3.0 model
//! descriptions: version, GUID or instantiation token, model identifier and
//! the scalar variables with their causality.

use std::fs;
use std::path::Path;

use roxmltree::{Document, Node};

use crate::error::{Error, Result};

/// FMI revision served by a C surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FmiVersion {
    V1,
    V2,
    V3,
}

impl FmiVersion {
    /// Value of the `fmiVersion` attribute.
    pub const fn as_str(self) -> &'static str {
        match self {
            FmiVersion::V1 => "1.0",
            FmiVersion::V2 => "2.0",
            FmiVersion::V3 => "3.0",
        }
    }

    /// Revision named by an `fmiVersion` attribute; FMI 3 point releases
    /// (`3.0.1`) count as 3.0.
    pub fn from_attribute(value: &str) -> Option<Self> {
        match value.trim() {
            "1.0" => Some(FmiVersion::V1),
            "2.0" => Some(FmiVersion::V2),
            v if v == "3.0" || v.starts_with("3.0.") => Some(FmiVersion::V3),
            _ => None,
        }
    }
}

/// Direction of a variable as seen by the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Causality {
    Input,
    Output,
    Parameter,
    Local,
    Other,
}

impl Causality {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("input") => Causality::Input,
            Some("output") => Causality::Output,
            Some("parameter" | "calculatedParameter" | "structuralParameter") => {
                Causality::Parameter
            }
            // FMI 2/3 default is local, FMI 1 says internal
            None | Some("local" | "internal") => Causality::Local,
            Some(_) => Causality::Other,
        }
    }
}

/// Value type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Real,
    Integer,
    Boolean,
    String,
    Enumeration,
    Other,
}

impl VariableKind {
    fn from_tag(tag: &str) -> Self {
        match tag {
            "Real" | "Float64" | "Float32" => VariableKind::Real,
            "Integer" | "Int8" | "UInt8" | "Int16" | "UInt16" | "Int32" | "UInt32" | "Int64"
            | "UInt64" => VariableKind::Integer,
            "Boolean" => VariableKind::Boolean,
            "String" => VariableKind::String,
            "Enumeration" => VariableKind::Enumeration,
            _ => VariableKind::Other,
        }
    }
}

/// One scalar variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelVariable {
    pub name: String,
    pub value_reference: u32,
    pub causality: Causality,
    pub kind: VariableKind,
    /// `true` when the variable aliases another one.
    pub alias: bool,
}

/// The parts of a model description the adapter uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescription {
    pub fmi_version: String,
    /// `guid` (FMI 1/2) or `instantiationToken` (FMI 3).
    pub guid: String,
    pub model_identifier: String,
    pub model_name: Option<String>,
    pub variables: Vec<ModelVariable>,
}

impl ModelDescription {
    /// Load and parse a model description file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::ModelDescription(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// Parse model description text.
    pub fn parse(text: &str) -> Result<Self> {
        let doc = Document::parse(text)
            .map_err(|e| Error::ModelDescription(format!("failed to parse XML: {}", e)))?;
        let root = doc.root_element();
        if root.tag_name().name() != "fmiModelDescription" {
            return Err(Error::ModelDescription(format!(
                "unexpected root element <{}>",
                root.tag_name().name()
            )));
        }

        let fmi_version = required_attribute(root, "fmiVersion")?.to_string();
        let guid = root
            .attribute("guid")
            .or_else(|| root.attribute("instantiationToken"))
            .ok_or_else(|| Error::ModelDescription("missing guid attribute".into()))?
            .to_string();

        // FMI 2/3 put the identifier on <CoSimulation>, FMI 1 on the root.
        let model_identifier = root
            .children()
            .find(|n| n.has_tag_name("CoSimulation"))
            .and_then(|n| n.attribute("modelIdentifier"))
            .or_else(|| root.attribute("modelIdentifier"))
            .ok_or_else(|| Error::ModelDescription("missing modelIdentifier".into()))?
            .to_string();

        let variables = match root.children().find(|n| n.has_tag_name("ModelVariables")) {
            Some(list) => list
                .children()
                .filter(Node::is_element)
                .map(parse_variable)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            fmi_version,
            guid,
            model_identifier,
            model_name: root.attribute("modelName").map(str::to_string),
            variables,
        })
    }

    /// Variables with the given causality, in document order.
    pub fn variables_with(&self, causality: Causality) -> impl Iterator<Item = &ModelVariable> {
        self.variables.iter().filter(move |v| v.causality == causality)
    }

    /// Number of input variables.
    pub fn input_count(&self) -> usize {
        self.variables_with(Causality::Input).count()
    }

    /// Number of output variables.
    pub fn output_count(&self) -> usize {
        self.variables_with(Causality::Output).count()
    }
}

fn required_attribute<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str> {
    node.attribute(name).ok_or_else(|| {
        Error::ModelDescription(format!(
            "<{}> has no {} attribute",
            node.tag_name().name(),
            name
        ))
    })
}

fn parse_variable(node: Node<'_, '_>) -> Result<ModelVariable> {
    let name = required_attribute(node, "name")?.to_string();
    let vr_text = required_attribute(node, "valueReference")?;
    let value_reference = vr_text.trim().parse::<u32>().map_err(|_| {
        Error::ModelDescription(format!(
            "variable {} has invalid valueReference '{}'",
            name, vr_text
        ))
    })?;

    // <ScalarVariable><Real/></ScalarVariable> or <Float64 .../>
    let kind = if node.has_tag_name("ScalarVariable") {
        node.children()
            .find(Node::is_element)
            .map(|n| VariableKind::from_tag(n.tag_name().name()))
            .unwrap_or(VariableKind::Other)
    } else {
        VariableKind::from_tag(node.tag_name().name())
    };

    let alias = matches!(node.attribute("alias"), Some("alias" | "negatedAlias"));

    Ok(ModelVariable {
        name,
        value_reference,
        causality: Causality::parse(node.attribute("causality")),
        kind,
        alias,
    })
}
