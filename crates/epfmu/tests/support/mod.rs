// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Test rig: an unpacked FMU on disk, a platform whose "simulation" is a
//! thread speaking the wire protocol, and a preparer that skips the real tool.

#![allow(dead_code)]

use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use epfmu::codec::{decode, encode, WireMessage};
use epfmu::transport::read_discovery_file;
use epfmu::{
    AdapterConfig, FmiVersion, Instance, InstanceContext, InstantiateRequest, MemorySink,
    Platform, PrepareRequest, PreparedRun, Result, RunPreparer, SimulationLaunch,
    SimulationProcess,
};

pub const TOKEN: &str = "T1";

pub const MODEL_DESCRIPTION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<fmiModelDescription fmiVersion="2.0" modelName="House" guid="T1" numberOfEventIndicators="0">
  <CoSimulation modelIdentifier="House" needsExecutionTool="true" canHandleVariableCommunicationStepSize="false"/>
  <ModelVariables>
    <ScalarVariable name="TSetHea" valueReference="1" causality="input" variability="discrete">
      <Real start="20"/>
    </ScalarVariable>
    <ScalarVariable name="TRoo" valueReference="100001" causality="output" variability="discrete">
      <Real/>
    </ScalarVariable>
  </ModelVariables>
  <ModelStructure/>
</fmiModelDescription>
"#;

/// Output the fake simulation computes from one input.
pub fn response(input: f64) -> f64 {
    2.0 * input + 1.0
}

/// Unpacked FMU plus an output root, both removed on drop.
pub struct FmuDir {
    pub root: tempfile::TempDir,
    pub out: tempfile::TempDir,
}

impl FmuDir {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let resources = root.path().join("resources");
        fs::create_dir(&resources).unwrap();
        fs::write(root.path().join("modelDescription.xml"), MODEL_DESCRIPTION).unwrap();
        fs::write(resources.join("variables.cfg"), "<BCVTB-variables/>\n").unwrap();
        fs::write(resources.join("House.idf"), "Version,9.6;\n").unwrap();
        fs::write(resources.join("Energy+.idd"), "!IDD_Version 9.6.0\n").unwrap();
        fs::write(resources.join("Chicago.epw"), "LOCATION,Chicago\n").unwrap();
        Self {
            root,
            out: tempfile::tempdir().unwrap(),
        }
    }

    pub fn location(&self) -> String {
        format!("file://{}/resources", self.root.path().display())
    }

    pub fn output_dir(&self, name: &str) -> PathBuf {
        self.out.path().join(format!("Output_EPExport_{}", name))
    }
}

// ============================================================================
// Fake simulation
// ============================================================================

/// Speaks the simulation side of the protocol: outputs first, then one
/// reply per input message until the end flag arrives.
fn run_peer(working_dir: PathBuf, step: f64) -> io::Result<usize> {
    let endpoint = read_discovery_file(&working_dir.join("socket.cfg"))?;
    let stream = TcpStream::connect(("127.0.0.1", endpoint.port))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);

    writer.write_all(encode(&WireMessage::data(0.0, vec![response(0.0)])).as_bytes())?;

    let mut exchanged = 0;
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let msg = decode(line.as_bytes()).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if msg.flag != 0 {
            break;
        }
        exchanged += 1;
        let outputs: Vec<f64> = msg.doubles.iter().copied().map(response).collect();
        writer.write_all(encode(&WireMessage::data(msg.time + step, outputs)).as_bytes())?;
    }
    Ok(exchanged)
}

#[derive(Debug)]
pub struct PeerProcess {
    handle: Option<JoinHandle<io::Result<usize>>>,
    exchanged: Arc<Mutex<Option<usize>>>,
}

impl SimulationProcess for PeerProcess {
    fn id(&self) -> Option<u32> {
        None
    }

    fn wait(&mut self) -> io::Result<Option<i32>> {
        let Some(handle) = self.handle.take() else {
            return Ok(Some(0));
        };
        let exchanged = handle
            .join()
            .map_err(|_| io::Error::other("simulation thread panicked"))??;
        *self.exchanged.lock().unwrap() = Some(exchanged);
        Ok(Some(0))
    }
}

/// Platform whose simulation runs on a thread.
#[derive(Debug, Default)]
pub struct ThreadPlatform {
    pub launches: Mutex<Vec<Vec<String>>>,
    /// Input messages the peer answered, set once it was waited for.
    pub exchanged: Arc<Mutex<Option<usize>>>,
}

impl Platform for ThreadPlatform {
    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn find_by_suffix(&self, dir: &Path, suffix: &str) -> io::Result<Vec<PathBuf>> {
        let mut found: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.to_string_lossy().ends_with(suffix))
            .collect();
        found.sort();
        Ok(found)
    }

    fn host_name(&self) -> String {
        "127.0.0.1".to_string()
    }

    fn spawn_simulation(&self, launch: &SimulationLaunch<'_>) -> io::Result<Box<dyn SimulationProcess>> {
        self.launches.lock().unwrap().push(
            launch
                .arguments()
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect(),
        );
        let working_dir = launch.working_dir.to_path_buf();
        let handle = thread::spawn(move || run_peer(working_dir, 900.0));
        Ok(Box::new(PeerProcess {
            handle: Some(handle),
            exchanged: Arc::clone(&self.exchanged),
        }))
    }
}

/// Writes what the preparation tool would: the run input, the weather file
/// and 4 time steps per hour.
#[derive(Debug, Default)]
pub struct StubPreparer;

impl RunPreparer for StubPreparer {
    fn prepare(&self, request: &PrepareRequest<'_>) -> Result<PreparedRun> {
        let model_file = request.output_dir.join(format!("{}.idf", request.model_id));
        fs::copy(request.model_input, &model_file)?;
        let weather_file = match request.weather {
            Some(weather) => {
                let target = request.output_dir.join("runweafile.epw");
                fs::copy(weather, &target)?;
                Some(target)
            }
            None => None,
        };
        fs::write(request.output_dir.join("tstep.txt"), "4\n")?;
        Ok(PreparedRun {
            model_file,
            weather_file,
        })
    }
}

/// Instantiate `name` from `fmu` on a [`ThreadPlatform`].
pub fn instantiate(
    fmu: &FmuDir,
    name: &str,
    token: &str,
) -> (Result<Instance>, Arc<ThreadPlatform>, Arc<MemorySink>) {
    let platform = Arc::new(ThreadPlatform::default());
    let sink = Arc::new(MemorySink::new());
    let ctx = InstanceContext::new(
        platform.clone(),
        Arc::new(StubPreparer),
        sink.clone(),
        AdapterConfig::default().with_output_root(fmu.out.path()),
    );
    let location = fmu.location();
    let request = InstantiateRequest {
        name,
        token,
        resource_location: &location,
        version: FmiVersion::V2,
        visible: false,
        logging_on: false,
    };
    (Instance::instantiate(&request, ctx), platform, sink)
}
