use procam_markers::{
    generate, write_png, IdBitsRenderer, MarkerLayout, MarkerLayoutParams, MarkerRegistry,
};

#[test]
fn identical_inputs_give_identical_canvases() {
    let params = MarkerLayoutParams::new(1280, 720).with_omit([15, 40]);
    let renderer = IdBitsRenderer::default();

    let (a, reg_a) = generate(params.clone(), &renderer).unwrap();
    let (b, reg_b) = generate(params, &renderer).unwrap();

    assert_eq!(a.data, b.data);
    assert_eq!(reg_a, reg_b);
    assert!(!reg_a.contains(15));
    assert!(!reg_a.contains(40));
}

#[test]
fn registry_matches_pure_layout() {
    let params = MarkerLayoutParams::new(1920, 1080).with_marker_size(80);
    let layout = MarkerLayout::compute(params.clone()).unwrap();
    let (_, reg) = generate(params, &IdBitsRenderer::default()).unwrap();

    assert_eq!(reg.len(), layout.slots.len());
    for slot in &layout.slots {
        let c = reg.get(slot.id).unwrap();
        assert_eq!(c[0].x, f64::from(slot.x));
        assert_eq!(c[2].y, f64::from(slot.y + 80));
    }
}

#[test]
fn exported_files_reload() {
    let dir = tempfile::tempdir().unwrap();
    let (canvas, reg) =
        generate(MarkerLayoutParams::new(800, 600), &IdBitsRenderer::default()).unwrap();

    let png_path = dir.path().join("canvas.png");
    let reg_path = dir.path().join("registry.json");
    write_png(&png_path, &canvas).unwrap();
    reg.write_json(&reg_path).unwrap();

    let bytes = std::fs::read(&png_path).unwrap();
    assert_eq!(&bytes[1..4], b"PNG");
    assert_eq!(MarkerRegistry::load_json(&reg_path).unwrap(), reg);
}
