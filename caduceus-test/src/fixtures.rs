//! Test fixtures and data generators

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;
use uuid::Uuid;

use caduceus_core::{
    DataType, IsolateName, IsolateNameType, MolType, Molecule, Plan, Segment, Strandedness,
    Topology,
};
use caduceus_ncbi::{GenbankRecord, GenbankSource};
use caduceus_repo::Repo;

/// A repository rooted in a temporary directory.
///
/// The directory lives as long as the fixture.
pub struct RepoFixture {
    pub repo: Repo,
    dir: TempDir,
}

impl RepoFixture {
    /// The path of the temporary directory containing the repository.
    pub fn base_path(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Drop the open repository handle and reopen it from disk, as a fresh
    /// process would.
    pub fn reopen(self) -> anyhow::Result<Self> {
        let Self { repo, dir } = self;

        let path = repo.path().to_path_buf();
        drop(repo);

        Ok(Self {
            repo: Repo::open(path)?,
            dir,
        })
    }
}

/// Generate a deterministic nucleotide sequence.
pub fn generate_nucleotides(length: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let bases = ['A', 'T', 'G', 'C'];

    (0..length).map(|_| bases[rng.gen_range(0..4)]).collect()
}

/// A monopartite plan with a single 150-base segment.
pub fn tmv_plan(length_tolerance: f64) -> Plan {
    Plan::new(vec![Segment::new(150, length_tolerance, None).unwrap()]).unwrap()
}

/// Single-stranded linear RNA, as for Tobacco mosaic virus.
pub fn tmv_molecule() -> Molecule {
    Molecule {
        strandedness: Strandedness::Single,
        kind: MolType::Rna,
        topology: Topology::Linear,
    }
}

/// A fresh repository containing only its creation event.
pub fn empty_repo() -> RepoFixture {
    let dir = TempDir::new().expect("failed to create temporary directory");

    let repo = Repo::new(
        DataType::Genome,
        "Generic Viruses",
        dir.path().join("test_repo"),
        "virus",
        0.03,
    )
    .expect("failed to create repository");

    RepoFixture { repo, dir }
}

/// A repository holding one TMV OTU with one linked sequence under isolate
/// "A".
///
/// Returns the fixture and the OTU id.
pub fn initialized_repo() -> (RepoFixture, Uuid) {
    let mut fixture = empty_repo();

    let otu = fixture
        .repo
        .create_otu(
            "TMV",
            None,
            tmv_molecule(),
            "Tobacco mosaic virus",
            tmv_plan(0.03),
            12242,
        )
        .expect("failed to create OTU");

    let segment_id = otu.plan.segments[0].id;

    let sequence = fixture
        .repo
        .create_sequence(
            otu.id,
            "TMVABC.1",
            "TMV",
            None,
            segment_id,
            &generate_nucleotides(150, 1),
        )
        .expect("failed to create sequence")
        .expect("sequence already existed");

    let isolate = fixture
        .repo
        .create_isolate(
            otu.id,
            None,
            Some(IsolateName::new(IsolateNameType::Isolate, "A")),
        )
        .expect("failed to create isolate");

    fixture
        .repo
        .link_sequence(otu.id, isolate.id, sequence.id)
        .expect("failed to link sequence");

    let otu_id = otu.id;

    (fixture, otu_id)
}

/// A GenBank record with TMV-flavored defaults and the given accession key
/// and sequence. Fields are public; adjust them directly where a test needs
/// something else.
pub fn genbank_record(accession: &str, sequence: &str) -> GenbankRecord {
    GenbankRecord {
        accession: accession.to_string(),
        version: 1,
        definition: "Tobacco mosaic virus, complete genome".to_string(),
        sequence: sequence.to_string(),
        comment: String::new(),
        moltype: MolType::Rna,
        strandedness: Strandedness::Single,
        topology: Topology::Linear,
        taxid: 12242,
        source: GenbankSource::default(),
    }
}

/// A standard RefSeq provenance comment naming a predecessor accession.
pub fn refseq_comment(predecessor: &str) -> String {
    format!(
        "PROVISIONAL REFSEQ: This record has not yet been subject to final \
         NCBI review. The reference sequence was derived from {predecessor}.",
    )
}
