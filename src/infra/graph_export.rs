// ============================================================
// Layer 6 — Portable Graph Export
// ============================================================
// Serialises the trained classifier as a framework-neutral
// computation graph, so a runtime that knows nothing about Burn
// can rebuild and run it.
//
// The blob is a single JSON document:
//
//   inputs        "input"  [batch, 3, H, W]    batch is dynamic
//   outputs       "logits" [batch, num_classes]
//   nodes         ops in execution order, each with named
//                 inputs/outputs and its attributes
//   initializers  every parameter tensor: name, shape, f32 data
//
// Op vocabulary follows ONNX naming (Conv, Relu, MaxPool,
// Flatten, Gemm, Dropout) so conversion to .onnx is a direct
// mapping. Gemm weights are stored the Burn way, [in, out], and
// flagged with transB = 0.
//
// Reference: ONNX operator specification

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use burn::{
    nn::{conv::Conv2d, Linear},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::shape::{ConvParams, POOL_FACTOR};
use crate::ml::model::TumorClassifier;

pub const GRAPH_FORMAT: &str = "tumor-classifier-graph";
pub const GRAPH_VERSION: u32 = 1;

pub const INPUT_NAME: &str = "input";
pub const OUTPUT_NAME: &str = "logits";
pub const BATCH_AXIS: &str = "batch";

/// One axis of a graph input/output: fixed size or a named dynamic axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dim {
    Fixed(usize),
    Dynamic(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueInfo {
    pub name:  String,
    pub shape: Vec<Dim>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub name:       String,
    pub op:         String,
    pub inputs:     Vec<String>,
    pub outputs:    Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Initializer {
    pub name:  String,
    pub shape: Vec<usize>,
    pub data:  Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphBlob {
    pub format:       String,
    pub version:      u32,
    pub inputs:       Vec<ValueInfo>,
    pub outputs:      Vec<ValueInfo>,
    pub nodes:        Vec<GraphNode>,
    pub initializers: Vec<Initializer>,
}

fn initializer<B: Backend, const D: usize>(name: String, tensor: Tensor<B, D>) -> Initializer {
    let shape = tensor.dims().to_vec();
    let data  = tensor.into_data().iter::<f32>().collect();
    Initializer { name, shape, data }
}

/// Accumulates nodes and initializers while walking the model.
struct GraphBuilder {
    nodes:        Vec<GraphNode>,
    initializers: Vec<Initializer>,
    current:      String,
}

impl GraphBuilder {
    fn new() -> Self {
        Self { nodes: Vec::new(), initializers: Vec::new(), current: INPUT_NAME.to_string() }
    }

    fn push(&mut self, name: &str, op: &str, params: Vec<String>, attributes: BTreeMap<String, Value>) {
        let output = format!("{name}_out");
        let mut inputs = vec![std::mem::replace(&mut self.current, output.clone())];
        inputs.extend(params);
        self.nodes.push(GraphNode {
            name: name.to_string(),
            op: op.to_string(),
            inputs,
            outputs: vec![output],
            attributes,
        });
    }

    fn conv<B: Backend>(&mut self, name: &str, conv: &Conv2d<B>) {
        let p = ConvParams::block();
        let mut params = vec![format!("{name}.weight")];
        self.initializers.push(initializer(params[0].clone(), conv.weight.val()));
        if let Some(bias) = &conv.bias {
            params.push(format!("{name}.bias"));
            self.initializers.push(initializer(format!("{name}.bias"), bias.val()));
        }
        let attributes = BTreeMap::from([
            ("kernel_shape".to_string(), json!([p.kernel_size, p.kernel_size])),
            ("strides".to_string(),      json!([p.stride, p.stride])),
            ("pads".to_string(),         json!([p.padding, p.padding, p.padding, p.padding])),
            ("dilations".to_string(),    json!([p.dilation, p.dilation])),
        ]);
        self.push(name, "Conv", params, attributes);
    }

    fn gemm<B: Backend>(&mut self, name: &str, linear: &Linear<B>) {
        let mut params = vec![format!("{name}.weight")];
        self.initializers.push(initializer(params[0].clone(), linear.weight.val()));
        if let Some(bias) = &linear.bias {
            params.push(format!("{name}.bias"));
            self.initializers.push(initializer(format!("{name}.bias"), bias.val()));
        }
        let attributes = BTreeMap::from([("transB".to_string(), json!(0))]);
        self.push(name, "Gemm", params, attributes);
    }

    fn op(&mut self, name: &str, op: &str, attributes: BTreeMap<String, Value>) {
        self.push(name, op, Vec::new(), attributes);
    }

    /// Rename the last node's output to the graph output name.
    fn finish(mut self, inputs: Vec<ValueInfo>, outputs: Vec<ValueInfo>) -> GraphBlob {
        if let Some(last) = self.nodes.last_mut() {
            last.outputs = vec![OUTPUT_NAME.to_string()];
        }
        GraphBlob {
            format: GRAPH_FORMAT.to_string(),
            version: GRAPH_VERSION,
            inputs,
            outputs,
            nodes: self.nodes,
            initializers: self.initializers,
        }
    }
}

/// Build the graph for `model` taking `[batch, channels, height, width]` input.
pub fn build_graph<B: Backend>(
    model:    &TumorClassifier<B>,
    channels: usize,
    height:   usize,
    width:    usize,
) -> GraphBlob {
    let mut g = GraphBuilder::new();

    let pool_attrs = || {
        BTreeMap::from([
            ("kernel_shape".to_string(), json!([POOL_FACTOR, POOL_FACTOR])),
            ("strides".to_string(),      json!([POOL_FACTOR, POOL_FACTOR])),
        ])
    };

    let convs = [&model.conv1, &model.conv2, &model.conv3, &model.conv4];
    for (i, conv) in convs.into_iter().enumerate() {
        let n = i + 1;
        g.conv(&format!("conv{n}"), conv);
        g.op(&format!("relu{n}"), "Relu", BTreeMap::new());
        g.op(&format!("pool{n}"), "MaxPool", pool_attrs());
    }

    g.op("flatten", "Flatten", BTreeMap::from([("axis".to_string(), json!(1))]));
    g.gemm("fc1", &model.fc1);
    g.op("relu5", "Relu", BTreeMap::new());
    g.op("dropout", "Dropout", BTreeMap::from([("ratio".to_string(), json!(model.dropout))]));
    g.gemm("fc2", &model.fc2);

    let batch = || Dim::Dynamic(BATCH_AXIS.to_string());
    let inputs = vec![ValueInfo {
        name:  INPUT_NAME.to_string(),
        shape: vec![batch(), Dim::Fixed(channels), Dim::Fixed(height), Dim::Fixed(width)],
    }];
    let outputs = vec![ValueInfo {
        name:  OUTPUT_NAME.to_string(),
        shape: vec![batch(), Dim::Fixed(model.num_classes())],
    }];

    g.finish(inputs, outputs)
}

impl GraphBlob {
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(path, json)
            .with_context(|| format!("Cannot write graph to '{}'", path.display()))?;
        tracing::debug!(
            "Wrote graph: {} nodes, {} initializers → '{}'",
            self.nodes.len(),
            self.initializers.len(),
            path.display()
        );
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read graph from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn parameter_count(&self) -> usize {
        self.initializers.iter().map(|i| i.data.len()).sum()
    }
}
