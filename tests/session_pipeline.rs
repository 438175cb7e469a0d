//! End-to-end session runs over the synthetic camera.

use std::time::Duration;

use faceguard::{
    AlertRecord, AlertSeverity, CameraConfig, CameraSource, FaceguardConfig, HistogramEngine,
    ScriptedEngine, Session,
};

fn test_config(dir: &std::path::Path) -> FaceguardConfig {
    let mut cfg = FaceguardConfig::default();
    cfg.database_dir = dir.join("database");
    cfg.logs_dir = dir.join("logs");
    cfg.temp_dir = dir.join("temp");
    cfg.camera.device = "stub://integration".to_string();
    cfg.camera.width = 96;
    cfg.camera.height = 72;
    cfg.recognition.process_every_n = 1;
    cfg
}

fn run_until(session: &mut Session, mut done: impl FnMut(&Session) -> bool) {
    for _ in 0..500 {
        session.tick().expect("tick");
        if done(session) {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("session condition not reached within deadline");
}

fn structured_records(logs_dir: &std::path::Path) -> Vec<AlertRecord> {
    let mut records = Vec::new();
    for entry in std::fs::read_dir(logs_dir).expect("logs dir").flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "jsonl") {
            for line in std::fs::read_to_string(&path).expect("read jsonl").lines() {
                records.push(serde_json::from_str(line).expect("valid record"));
            }
        }
    }
    records
}

#[test]
fn matched_vip_flows_through_to_both_logs() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    let engine =
        ScriptedEngine::new().with_candidate("database/vip/carlos/carlos_20240101.jpg", 0.3);

    let mut session = Session::start(&cfg, Box::new(engine)).unwrap();
    run_until(&mut session, |s| s.stats().alerts_generated >= 1);
    let stats = session.finish().unwrap();

    assert!(stats.successful_matches >= 1);

    let records = structured_records(&cfg.logs_dir);
    assert!(!records.is_empty());
    let record = &records[0];
    assert_eq!(record.nombre, "Carlos");
    assert_eq!(record.rol, "VIP");
    assert_eq!(record.nivel_acceso, 3);
    assert_eq!(record.confianza, 70.0);
    assert_eq!(record.tipo_alerta, AlertSeverity::Low);

    let text = std::fs::read_dir(&cfg.logs_dir)
        .unwrap()
        .flatten()
        .find(|e| e.path().extension().is_some_and(|ext| ext == "log"))
        .expect("text log exists");
    let raw = std::fs::read_to_string(text.path()).unwrap();
    assert!(raw.contains("ALERTA [BAJO]"));
    assert!(raw.contains("NUEVA SESION DE RECONOCIMIENTO INICIADA"));
    assert!(raw.contains("SESION DE RECONOCIMIENTO FINALIZADA"));
}

#[test]
fn histogram_engine_recognizes_an_enrolled_frame() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());

    // Enroll: capture one synthetic frame and file it under vip/carlos.
    // The session camera replays the same synthetic scene, so the probe
    // embedding lands at (near) zero distance from this reference.
    let mut camera = CameraSource::new(CameraConfig::from(&cfg.camera)).unwrap();
    camera.connect().unwrap();
    let reference = camera.next_frame().unwrap();
    let person_dir = cfg.database_dir.join("vip").join("carlos");
    std::fs::create_dir_all(&person_dir).unwrap();
    reference
        .to_image()
        .unwrap()
        .save(person_dir.join("carlos_20240101.png"))
        .unwrap();

    let mut session = Session::start(&cfg, Box::new(HistogramEngine::new())).unwrap();
    run_until(&mut session, |s| s.stats().successful_matches >= 1);
    let stats = session.finish().unwrap();

    assert!(stats.successful_matches >= 1);
    let records = structured_records(&cfg.logs_dir);
    assert!(records.iter().any(|r| r.nombre == "Carlos" && r.rol == "VIP"));
}

#[test]
fn empty_database_flags_everyone_as_critical() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path());
    std::fs::create_dir_all(&cfg.database_dir).unwrap();

    let mut session = Session::start(&cfg, Box::new(HistogramEngine::new())).unwrap();
    run_until(&mut session, |s| s.stats().alerts_generated >= 1);
    let stats = session.finish().unwrap();

    assert_eq!(stats.successful_matches, 0);
    let records = structured_records(&cfg.logs_dir);
    assert!(!records.is_empty());
    for record in &records {
        assert_eq!(record.nombre, "Desconocido");
        assert_eq!(record.rol, "No autorizado");
        assert_eq!(record.tipo_alerta, AlertSeverity::Critical);
        assert_eq!(record.confianza, 0.0);
    }
}
