use celestial_healpix::fits::write_maps;
use celestial_healpix::{npix, HealpixMap};
use celestial_mapper::{
    FitsMapReader, HalfSplitGenerator, MapReader, Mapper, MapperError, MapperResult, ModeSelection, RawConfig,
    SurveyConfig,
};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::{tempdir, TempDir};

const NATIVE_NSIDE: u32 = 8;
const TARGET_NSIDE: u32 = 2;
/// Native pixels per target pixel.
const CHILDREN: usize = 16;

/// Counts layer reads so tests can tell cache hits from recomputation.
#[derive(Clone, Default)]
struct CountingReader {
    reads: Rc<Cell<usize>>,
}

impl MapReader for CountingReader {
    fn read_layer(&self, path: &Path, layer: usize) -> MapperResult<HealpixMap> {
        self.reads.set(self.reads.get() + 1);
        FitsMapReader.read_layer(path, layer)
    }
}

/// Native-resolution map that is zero on the children of `parents` at the
/// target resolution and one elsewhere.
fn block_mask(parents: &[usize]) -> HealpixMap {
    let values = (0..npix(NATIVE_NSIDE))
        .map(|p| if parents.contains(&(p / CHILDREN)) { 0.0 } else { 1.0 })
        .collect();
    HealpixMap::new(NATIVE_NSIDE, values).expect("valid mask")
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    /// SMICA-style inputs: half maps valued 2 and 4, point-source layers
    /// F100/F143/F217/F353 masking target pixels 0/5/7/9, galactic-plane
    /// layer `k` masking target pixel `10 + k`.
    fn smica() -> Self {
        let dir = tempdir().expect("tempdir");
        let path = |name: &str| dir.path().join(name);

        let full = HealpixMap::filled(NATIVE_NSIDE, 3.0).expect("map");
        let hm1 = HealpixMap::filled(NATIVE_NSIDE, 2.0).expect("map");
        let hm2 = HealpixMap::filled(NATIVE_NSIDE, 4.0).expect("map");
        write_maps(path("smica.fits"), &[("I_STOKES", &full)], None, false).expect("write map");
        write_maps(path("smica_hm1.fits.gz"), &[("I_STOKES", &hm1)], None, true).expect("write hm1");
        write_maps(path("smica_hm2.fits"), &[("I_STOKES", &hm2)], None, false).expect("write hm2");

        let ps: Vec<HealpixMap> = [0, 5, 7, 9].iter().map(|&p| block_mask(&[p])).collect();
        let ps_columns: Vec<(&str, &HealpixMap)> = ["F100", "F143", "F217", "F353"]
            .into_iter()
            .zip(ps.iter())
            .collect();
        write_maps(path("ps_mask.fits"), &ps_columns, None, false).expect("write ps mask");

        let gp: Vec<HealpixMap> = (0..8).map(|k| block_mask(&[10 + k])).collect();
        let gp_columns: Vec<(&str, &HealpixMap)> = gp.iter().map(|m| ("GAL", m)).collect();
        write_maps(path("gp_mask.fits"), &gp_columns, None, false).expect("write gp mask");

        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn rerun(&self) -> PathBuf {
        self.path("rerun")
    }

    fn raw(&self) -> RawConfig {
        RawConfig {
            survey: Some("P18SMICA".into()),
            nside: Some(TARGET_NSIDE),
            coords: Some("G".into()),
            file_map: Some(self.path("smica.fits")),
            file_hm1: Some(self.path("smica_hm1.fits.gz")),
            file_hm2: Some(self.path("smica_hm2.fits")),
            file_gp_mask: Some(self.path("gp_mask.fits")),
            file_ps_mask: Some(self.path("ps_mask.fits")),
            ps_mask_mode: Some(vec!["F100".into(), "F143".into()]),
            path_rerun: Some(self.rerun()),
            ..Default::default()
        }
    }

    fn mapper(&self, raw: RawConfig) -> (Mapper<CountingReader>, Rc<Cell<usize>>) {
        let reader = CountingReader::default();
        let reads = reader.reads.clone();
        let config = SurveyConfig::resolve(raw).expect("valid configuration");
        (Mapper::with_reader(config, reader), reads)
    }

    fn cached_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.rerun())
            .expect("rerun dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

#[test]
fn test_half_split_end_to_end() {
    let fixture = Fixture::smica();
    let (mut mapper, _) = fixture.mapper(fixture.raw());

    let pair = mapper.get_half_split_maps().expect("half-split maps");
    for (row, level) in pair.rows().iter().zip([2.0, 4.0]) {
        assert_eq!(row.nside(), TARGET_NSIDE);
        assert_eq!(row.values().len(), 12 * (TARGET_NSIDE * TARGET_NSIDE) as usize);
        for (pix, &value) in row.values().iter().enumerate() {
            let expected = if pix == 0 || pix == 5 { 0.0 } else { level };
            assert_eq!(value, expected, "pixel {}", pix);
        }
    }
}

#[test]
fn test_point_source_mask_is_read_for_each_half() {
    let fixture = Fixture::smica();
    let config = SurveyConfig::resolve(fixture.raw()).expect("valid configuration");
    let reader = CountingReader::default();

    let pair = HalfSplitGenerator::new(&config, &reader).generate().expect("half-split maps");
    // One data layer plus two point-source layers per half
    assert_eq!(reader.reads.get(), 2 * (1 + 2));
    assert_eq!(pair.nside(), TARGET_NSIDE);
    assert!(fixture.rerun().read_dir().is_err());
}

#[test]
fn test_noise_map_from_cached_pair() {
    let fixture = Fixture::smica();
    let (mut mapper, reads) = fixture.mapper(fixture.raw());

    mapper.get_half_split_maps().expect("half-split maps");
    let after_pair = reads.get();
    let noise = mapper.get_noise_map().expect("noise map");
    assert_eq!(reads.get(), after_pair);
    assert_eq!(noise.values()[0], 0.0);
    assert_eq!(noise.values()[1], -1.0);
}

#[test]
fn test_mask_is_stable_across_calls_and_runs() {
    let fixture = Fixture::smica();
    let (mut mapper, reads) = fixture.mapper(fixture.raw());

    let first = mapper.get_mask().expect("mask");
    let reads_after_first = reads.get();
    let second = mapper.get_mask().expect("mask");
    assert_eq!(reads.get(), reads_after_first);
    assert!(first
        .values()
        .iter()
        .zip(second.values())
        .all(|(a, b)| a.to_bits() == b.to_bits()));

    // Default gp mode 0.6 is layer 2, which masks pixel 12
    for (pix, &value) in first.values().iter().enumerate() {
        let expected = if [0, 5, 12].contains(&pix) { 0.0 } else { 1.0 };
        assert_eq!(value, expected, "pixel {}", pix);
    }

    let (mut rerun, rerun_reads) = fixture.mapper(fixture.raw());
    assert_eq!(rerun.get_mask().expect("mask"), first);
    assert_eq!(rerun_reads.get(), 0);
}

#[test]
fn test_deleting_cached_mask_keeps_half_split_entry() {
    let fixture = Fixture::smica();
    let (mut mapper, _) = fixture.mapper(fixture.raw());
    let mask = mapper.get_mask().expect("mask");
    let pair = mapper.get_half_split_maps().expect("half-split maps");

    let files = fixture.cached_files();
    assert_eq!(files.len(), 2, "{:?}", files);
    let mask_file = files
        .iter()
        .find(|f| f.starts_with("mask_P18SMICA_coordG_ns2_"))
        .expect("mask entry");
    let hm_file = files
        .iter()
        .find(|f| f.starts_with("P18SMICA_hm_maps_coordG_ns2_"))
        .expect("half-split entry");
    let hm_bytes = std::fs::read(fixture.rerun().join(hm_file)).expect("read entry");
    std::fs::remove_file(fixture.rerun().join(mask_file)).expect("remove mask entry");

    let (mut rerun, reads) = fixture.mapper(fixture.raw());
    assert_eq!(rerun.get_half_split_maps().expect("half-split maps"), pair);
    assert_eq!(reads.get(), 0, "half-split entry should be served from disk");

    assert_eq!(rerun.get_mask().expect("mask"), mask);
    assert!(reads.get() > 0, "mask should be recomputed");
    assert_eq!(fixture.cached_files(), files);
    assert_eq!(
        std::fs::read(fixture.rerun().join(hm_file)).expect("read entry"),
        hm_bytes
    );
}

#[test]
fn test_changed_selection_misses_the_cache() {
    let fixture = Fixture::smica();
    let (mut mapper, _) = fixture.mapper(fixture.raw());
    mapper.get_half_split_maps().expect("half-split maps");

    let mut raw = fixture.raw();
    raw.ps_mask_mode = Some(vec!["F217".into()]);
    let (mut changed, reads) = fixture.mapper(raw);
    let pair = changed.get_half_split_maps().expect("half-split maps");
    assert!(reads.get() > 0);
    assert_eq!(pair.first().values()[0], 2.0);
    assert_eq!(pair.first().values()[7], 0.0);
    assert_eq!(fixture.cached_files().len(), 2);
}

#[test]
fn test_rotation_to_equatorial() {
    let fixture = Fixture::smica();
    let mut raw = fixture.raw();
    raw.coords = Some("C".into());
    raw.ps_mask_mode = Some(vec![]);
    let (mut mapper, _) = fixture.mapper(raw);

    let pair = mapper.get_half_split_maps().expect("half-split maps");
    assert_eq!(pair.nside(), TARGET_NSIDE);
    // Constant inputs stay constant under rotation
    assert!(pair.first().values().iter().all(|&v| v == 2.0));
    assert!(pair.second().values().iter().all(|&v| v == 4.0));
}

#[test]
fn test_signal_map() {
    let fixture = Fixture::smica();
    let (mut mapper, _) = fixture.mapper(fixture.raw());
    let signal = mapper.get_signal_map().expect("signal map");
    assert_eq!(signal.nside(), TARGET_NSIDE);
    assert_eq!(signal.values()[0], 0.0);
    assert_eq!(signal.values()[1], 3.0);
}

#[test]
fn test_unknown_galactic_plane_mode() {
    let fixture = Fixture::smica();
    let mut raw = fixture.raw();
    raw.gp_mask_mode = Some(ModeSelection::Single("0.5".into()));
    let (mut mapper, reads) = fixture.mapper(raw);

    let err = mapper.get_mask().expect_err("0.5 is not a SMICA mode");
    assert!(matches!(err, MapperError::UnknownMode { ref label, .. } if label == "0.5"));
    assert_eq!(reads.get(), 0);
}

#[test]
fn test_multiple_galactic_plane_modes() {
    let fixture = Fixture::smica();
    let mut raw = fixture.raw();
    raw.gp_mask_mode = Some(ModeSelection::List(vec!["0.4".into(), "0.6".into()]));
    let (mut mapper, _) = fixture.mapper(raw);
    assert!(matches!(mapper.get_mask(), Err(MapperError::Configuration(_))));
}

#[test]
fn test_upsampling_request() {
    let fixture = Fixture::smica();
    let mut raw = fixture.raw();
    raw.nside = Some(16);
    let (mut mapper, _) = fixture.mapper(raw);
    assert!(matches!(
        mapper.get_half_split_maps(),
        Err(MapperError::Resampling(_))
    ));
    assert!(!fixture.rerun().exists() || fixture.cached_files().is_empty());
}

#[test]
fn test_missing_half_mission_file() {
    let fixture = Fixture::smica();
    let mut raw = fixture.raw();
    raw.file_hm2 = Some(fixture.path("absent.fits"));
    let (mut mapper, _) = fixture.mapper(raw);
    assert!(matches!(
        mapper.get_half_split_maps(),
        Err(MapperError::SourceRead { .. })
    ));
}

#[test]
fn test_load_from_toml() {
    let fixture = Fixture::smica();
    let toml_path = fixture.path("smica.toml");
    let text = format!(
        r#"
survey = "P18SMICA"
nside = {nside}
coords = "G"
file_map = "{map}"
file_hm1 = "{hm1}"
file_hm2 = "{hm2}"
file_ps_mask = "{ps}"
ps_mask_mode = ["F353"]
beam_info = [{{ type = "Gaussian", FWHM_arcmin = 5.0 }}]
"#,
        nside = TARGET_NSIDE,
        map = fixture.path("smica.fits").display(),
        hm1 = fixture.path("smica_hm1.fits.gz").display(),
        hm2 = fixture.path("smica_hm2.fits").display(),
        ps = fixture.path("ps_mask.fits").display(),
    );
    std::fs::write(&toml_path, text).expect("write config");

    let mut mapper = Mapper::from_toml_file(&toml_path).expect("mapper");
    assert_eq!(mapper.get_dtype().as_str(), "cmb_temperature");
    let pair = mapper.get_half_split_maps().expect("half-split maps");
    assert_eq!(pair.second().values()[9], 0.0);
    assert_eq!(pair.second().values()[0], 4.0);
}
