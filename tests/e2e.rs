//! End-to-end integration tests for the redemption pipeline
//!
//! Builds a synthetic published dataset (tree, faucet, bucket, mapping),
//! pins its digests into network params, serves it through the cached
//! artifact client, and drives the full pipeline: artifact verification
//! -> nonce scan -> key transform -> leaf lookup -> subtree diff ->
//! proof assembly -> independent verification.

use std::sync::Mutex;

use k256::ecdsa::signature::Verifier;
use k256::ecdsa::{Signature, VerifyingKey};
use rand::RngCore;
use sha2::{Digest, Sha256};

use redeem_client::ClientBuilder;
use redeem_core::{
    constants::REWARD_VALUE, derive_fillers, seal_pair, tree_root, AllocationKey, ArtifactKind,
    CiphertextBucket, Event, EventSink, FaucetList, Hash32, KeyOrigin, MainIndex, MainTree,
    MappingEntry, NetworkParams, ProofBuilder, ProofMapping, RedeemSecret, Redeemer,
    RedemptionProof, TargetAddress, TransformMode,
};

fn random_secret() -> RedeemSecret {
    let mut bytes = [0u8; 32];
    loop {
        rand::thread_rng().fill_bytes(&mut bytes);
        if let Ok(secret) = RedeemSecret::from_bytes(&mut bytes.clone()) {
            return secret;
        }
    }
}

struct Dataset {
    params: NetworkParams,
    tree_bytes: Vec<u8>,
    faucet_bytes: Vec<u8>,
    bucket_bytes: Vec<u8>,
    mapping_bytes: Vec<u8>,
    holder: RedeemSecret,
    key: AllocationKey,
    registered: TargetAddress,
    target: TargetAddress,
}

/// Assemble a complete synthetic network: 4 subtrees of 2 leaves with
/// the holder's transformed leaf planted at (2, 1) next to a seed-derived
/// filler, a 3-entry faucet carrying one registered address, and a
/// 3-record bucket where only the middle record is sealed to the holder.
fn dataset(mode: TransformMode) -> Dataset {
    let mut params = NetworkParams::testnet();
    params.main_leaves = 4;
    params.subtree_size = 2;
    params.faucet_leaves = 3;

    let holder = random_secret();
    let key = AllocationKey::from_public_key(KeyOrigin::Pgp, holder.public_key()).unwrap();
    let nonce = [0x61u8; 32];
    let seed = [0x62u8; 32];
    let own_leaf = key.transform(mode, &nonce).unwrap().leaf_hash();

    let fillers = derive_fillers(&seed, 2);
    let subtrees: Vec<[Hash32; 2]> = vec![
        [Sha256::digest([1u8]).into(), Sha256::digest([2u8]).into()],
        [Sha256::digest([3u8]).into(), Sha256::digest([4u8]).into()],
        [fillers[0], own_leaf],
        [Sha256::digest([5u8]).into(), Sha256::digest([6u8]).into()],
    ];
    let mut tree_bytes = (4u32).to_be_bytes().to_vec();
    for subtree in &subtrees {
        for leaf in subtree {
            tree_bytes.extend_from_slice(leaf);
        }
    }
    params.main_tree_digest = Sha256::digest(&tree_bytes).into();

    let registered = TargetAddress::from_parts("tr", vec![0x42; 20]).unwrap();
    let faucet_leaves: Vec<Hash32> = vec![
        Sha256::digest([7u8]).into(),
        registered.identity_hash(),
        Sha256::digest([8u8]).into(),
    ];
    let mut faucet_bytes = (3u32).to_be_bytes().to_vec();
    for leaf in &faucet_leaves {
        faucet_bytes.extend_from_slice(leaf);
    }
    params.faucet_digest = Sha256::digest(&faucet_bytes).into();

    let records = vec![
        seal_pair(
            &random_secret().public_key(),
            &random_secret(),
            &[9u8; 32],
            &[9u8; 32],
        )
        .unwrap(),
        seal_pair(&holder.public_key(), &random_secret(), &nonce, &seed).unwrap(),
        seal_pair(
            &random_secret().public_key(),
            &random_secret(),
            &[8u8; 32],
            &[8u8; 32],
        )
        .unwrap(),
    ];
    let mut bucket_bytes = Vec::new();
    for record in &records {
        bucket_bytes.extend_from_slice(&(record.len() as u16).to_be_bytes());
        bucket_bytes.extend_from_slice(record);
    }
    params.bucket_digests[key.bucket() as usize] = Sha256::digest(&bucket_bytes).into();

    let entries = vec![MappingEntry(registered.to_string(), REWARD_VALUE, false)];
    let mapping_bytes = serde_json::to_vec(&entries).unwrap();
    params.mapping_digest = Sha256::digest(&mapping_bytes).into();

    let tree = MainTree::parse(&params, &tree_bytes).unwrap();
    params.main_root = MainIndex::build(&tree).root();
    params.faucet_root = tree_root(&faucet_leaves);

    Dataset {
        params,
        tree_bytes,
        faucet_bytes,
        bucket_bytes,
        mapping_bytes,
        holder,
        key,
        registered,
        target: TargetAddress::from_parts("tr", vec![0x99; 20]).unwrap(),
    }
}

/// Sink that records every event's name, in order
struct RecordingSink(Mutex<Vec<&'static str>>);

impl RecordingSink {
    fn new() -> Self {
        Self(Mutex::new(Vec::new()))
    }

    fn names(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: Event) {
        let name = match event {
            Event::ArtifactVerified { .. } => "artifact_verified",
            Event::LeafLocated { .. } => "leaf_located",
            Event::NoncesFound { .. } => "nonces_found",
            Event::SubtreeDiffed { .. } => "subtree_diffed",
            Event::ProofAssembled { .. } => "proof_assembled",
        };
        self.0.lock().unwrap().push(name);
    }
}

#[tokio::test]
async fn key_origin_pipeline_over_cached_artifacts() {
    let d = dataset(TransformMode::Tweaked);

    // pre-seed the cache; the unroutable base URL proves no network I/O
    let cache = std::env::temp_dir().join("redeem-e2e-key-origin");
    let _ = std::fs::remove_dir_all(&cache);
    std::fs::create_dir_all(&cache).unwrap();
    std::fs::write(cache.join("tree.bin"), &d.tree_bytes).unwrap();
    let bucket_kind = ArtifactKind::NonceBucket(d.key.bucket());
    std::fs::write(cache.join(bucket_kind.file_name()), &d.bucket_bytes).unwrap();

    let client = ClientBuilder::new(d.params.clone(), "http://127.0.0.1:9")
        .cache_dir(&cache)
        .build()
        .unwrap();
    let tree_bytes = client.fetch(ArtifactKind::MainTree).await.unwrap();
    let bucket_bytes = client.fetch(bucket_kind).await.unwrap();

    let tree = MainTree::parse(&d.params, &tree_bytes).unwrap();
    let bucket = CiphertextBucket::parse(&d.params, d.key.bucket(), &bucket_bytes).unwrap();

    let sink = RecordingSink::new();
    let redeemer = Redeemer::new(&d.params, &sink);
    let outcome = redeemer
        .redeem_key(
            &tree,
            &bucket,
            &d.key,
            &d.holder,
            TransformMode::Tweaked,
            &d.target,
            20_000,
        )
        .unwrap();

    assert_eq!(outcome.proofs.len(), 1);
    let proof = &outcome.proofs[0];
    assert_eq!((proof.index, proof.subindex), (2, Some(1)));
    ProofBuilder::new(&d.params)
        .verify(proof, REWARD_VALUE)
        .unwrap();

    // the subtree diff surfaces exactly our own leaf as genuine
    assert_eq!(outcome.diffs[0].genuine.len(), 1);
    assert_eq!(outcome.diffs[0].own_slot, Some(1));
    assert_eq!(outcome.diffs[0].synthetic, vec![0]);

    assert_eq!(
        sink.names(),
        vec![
            "nonces_found",
            "leaf_located",
            "subtree_diffed",
            "proof_assembled"
        ]
    );

    let _ = std::fs::remove_dir_all(&cache);
}

#[tokio::test]
async fn corrupted_cached_artifact_is_rejected() {
    let d = dataset(TransformMode::Tweaked);
    let cache = std::env::temp_dir().join("redeem-e2e-corrupt");
    let _ = std::fs::remove_dir_all(&cache);
    std::fs::create_dir_all(&cache).unwrap();

    let mut mangled = d.tree_bytes.clone();
    mangled[17] ^= 0x01;
    std::fs::write(cache.join("tree.bin"), &mangled).unwrap();

    // the flipped bit invalidates the cache entry, and with no reachable
    // mirror the re-fetch must fail rather than hand back bad bytes
    let client = ClientBuilder::new(d.params.clone(), "http://127.0.0.1:9")
        .cache_dir(&cache)
        .timeout(std::time::Duration::from_millis(200))
        .build()
        .unwrap();
    assert!(client.fetch(ArtifactKind::MainTree).await.is_err());

    let _ = std::fs::remove_dir_all(&cache);
}

#[test]
fn address_origin_pipeline_from_mapping() {
    let d = dataset(TransformMode::Tweaked);
    let faucet = FaucetList::parse(&d.params, &d.faucet_bytes).unwrap();
    let mapping = ProofMapping::parse(&d.params, &d.mapping_bytes).unwrap();

    let entry = mapping.get(&d.registered.to_string()).unwrap();
    assert_eq!(entry.value(), REWARD_VALUE);
    assert!(!entry.sponsor());
    let key = AllocationKey::from_address(d.registered.clone(), entry);

    let sink = RecordingSink::new();
    let redeemer = Redeemer::new(&d.params, &sink);
    let proof = redeemer.redeem_address(&faucet, &key, 5_000).unwrap();

    assert_eq!(proof.index, 1);
    assert!(proof.subindex.is_none());
    assert!(proof.signature.is_none());
    ProofBuilder::new(&d.params)
        .verify(&proof, REWARD_VALUE)
        .unwrap();
    assert_eq!(sink.names(), vec!["leaf_located", "proof_assembled"]);
}

#[test]
fn proof_signature_checks_out_against_the_embedded_key() {
    for mode in [TransformMode::Tweaked, TransformMode::Bare] {
        let d = dataset(mode);
        let tree = MainTree::parse(&d.params, &d.tree_bytes).unwrap();
        let bucket =
            CiphertextBucket::parse(&d.params, d.key.bucket(), &d.bucket_bytes).unwrap();

        let redeemer = Redeemer::new(&d.params, &redeem_core::NullSink);
        let outcome = redeemer
            .redeem_key(&tree, &bucket, &d.key, &d.holder, mode, &d.target, 0)
            .unwrap();
        let proof = &outcome.proofs[0];

        // check the signature with plain k256, outside the library
        let verifying = VerifyingKey::from_sec1_bytes(&proof.key[..33]).unwrap();
        let signature = Signature::from_slice(proof.signature.as_deref().unwrap()).unwrap();
        verifying.verify(&proof.signing_bytes(), &signature).unwrap();

        match mode {
            TransformMode::Bare => assert_eq!(proof.key.len(), 33 + 32),
            TransformMode::Tweaked => assert_eq!(proof.key.len(), 33),
        }
    }
}

#[test]
fn proof_survives_byte_and_json_round_trips() {
    let d = dataset(TransformMode::Tweaked);
    let tree = MainTree::parse(&d.params, &d.tree_bytes).unwrap();
    let bucket = CiphertextBucket::parse(&d.params, d.key.bucket(), &d.bucket_bytes).unwrap();
    let redeemer = Redeemer::new(&d.params, &redeem_core::NullSink);
    let proof = redeemer
        .redeem_key(
            &tree,
            &bucket,
            &d.key,
            &d.holder,
            TransformMode::Tweaked,
            &d.target,
            12_345,
        )
        .unwrap()
        .proofs
        .remove(0);

    let decoded = RedemptionProof::from_bytes(&proof.to_bytes()).unwrap();
    assert_eq!(decoded, proof);
    ProofBuilder::new(&d.params)
        .verify(&decoded, REWARD_VALUE)
        .unwrap();

    let json = serde_json::to_string(&proof).unwrap();
    assert!(json.contains(&hex::encode(proof.branch[0])));
    let from_json: RedemptionProof = serde_json::from_str(&json).unwrap();
    assert_eq!(from_json, proof);

    assert!(!proof.to_base64().is_empty());
}

#[test]
fn verification_rejects_a_tampered_fee() {
    let d = dataset(TransformMode::Tweaked);
    let tree = MainTree::parse(&d.params, &d.tree_bytes).unwrap();
    let bucket = CiphertextBucket::parse(&d.params, d.key.bucket(), &d.bucket_bytes).unwrap();
    let redeemer = Redeemer::new(&d.params, &redeem_core::NullSink);
    let mut proof = redeemer
        .redeem_key(
            &tree,
            &bucket,
            &d.key,
            &d.holder,
            TransformMode::Tweaked,
            &d.target,
            10_000,
        )
        .unwrap()
        .proofs
        .remove(0);

    // the fee is covered by the signature; bumping it must break it
    proof.fee = 10_001;
    assert!(ProofBuilder::new(&d.params)
        .verify(&proof, REWARD_VALUE)
        .is_err());
}
