use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use anyhow::Error;

use exa_api_types::{NetAddress, Owner, RemoteVolumeType, VolumeType};
use exa_config::{CommitStatus, ConfigError, ExaConf};

use exaconf::ops::{
    self, node::NodeUpdate, remote_volume::NewRemoteVolume, user::UserUpdate, volume::NewVolume,
    volume::VolumeUpdate,
};

fn testfile(name: &str) -> PathBuf {
    let mut path: PathBuf = String::from("./target/testout/exaconf").into();
    let _ = std::fs::create_dir_all(&path);
    path.push(name);
    let _ = std::fs::remove_file(&path);
    path
}

/// Write an initialized document without nodes, volumes or users.
fn create_empty(path: &Path) -> Result<(), ConfigError> {
    let mut conf = ExaConf::create(path, "cl1");
    conf.commit()?;
    Ok(())
}

fn add_nodes(path: &Path, count: usize) -> Result<Vec<u64>, ConfigError> {
    let mut ids = Vec::new();
    for _ in 0..count {
        let (id, _) = ops::update_exaconf(path, |conf| {
            let id = ops::node::add_node(conf, None, "10.10.10.x/24", None)?;
            ops::node::add_node_device(conf, id, "disk1", "dev.1", None)?;
            Ok(id)
        })?;
        ids.push(id);
    }
    Ok(ids)
}

fn data_volume(name: &str, nodes: Vec<u64>) -> NewVolume {
    NewVolume {
        name: name.into(),
        vol_type: VolumeType::Data,
        size: 1 << 30,
        disk: "disk1".into(),
        redundancy: 1,
        nodes,
        owner: Owner::new(500, 500),
        num_master_nodes: None,
        perm: None,
        labels: Vec::new(),
        block_size: None,
        stripe_size: None,
    }
}

#[test]
fn test_add_and_modify_node() -> Result<(), Error> {
    let path = testfile("add-modify-node");
    create_empty(&path)?;

    let (id, status) = ops::update_exaconf(&path, |conf| {
        ops::node::add_node(conf, None, "10.10.10.X/24", None)
    })?;
    assert_eq!(id, 11);
    assert_eq!(status, CommitStatus::Written(2));

    let text = std::fs::read_to_string(&path)?;
    assert!(text.contains("[Node : 11]\n"));
    assert!(text.contains("    PrivateNet = 10.10.10.11/24\n"));

    let update = NodeUpdate {
        priv_ip: Some("10.10.10.99".into()),
        ..Default::default()
    };
    ops::update_exaconf(&path, |conf| ops::node::modify_node(conf, "11", &update))?;

    let conf = ops::read_exaconf(&path)?;
    assert_eq!(conf.node(11)?.private, Some(NetAddress::Ip("10.10.10.99".into())));
    assert_eq!(conf.revision()?, 3);

    let text = std::fs::read_to_string(&path)?;
    assert!(text.contains("    PrivateIP = 10.10.10.99\n"));
    assert!(!text.contains("PrivateNet"));

    // the next free id fills the gap
    let (id, _) = ops::update_exaconf(&path, |conf| {
        ops::node::add_node(conf, Some(13), "10.10.10.x/24", None)?;
        ops::node::add_node(conf, None, "10.10.10.x/24", Some("192.168.0.x/16"))
    })?;
    assert_eq!(id, 12);
    Ok(())
}

#[test]
fn test_unmodified_document_is_not_written() -> Result<(), Error> {
    let path = testfile("unmodified");
    create_empty(&path)?;
    ops::update_exaconf(&path, |conf| ops::user::add_group(conf, "exausers", 500))?;

    let (_, status) = ops::update_exaconf(&path, |conf| {
        ops::user::add_user(
            conf,
            ops::user::NewUser {
                name: "exadefusr".into(),
                id: 500,
                group: "exausers".into(),
                login_enabled: false,
                passwd: None,
                encode_passwd: false,
                additional_groups: Vec::new(),
                authorized_keys: Vec::new(),
            },
        )
    })?;
    assert_eq!(status, CommitStatus::Written(3));

    let before = std::fs::metadata(&path)?;
    let text = std::fs::read_to_string(&path)?;

    // setting the current values changes nothing
    let update = UserUpdate {
        login_enabled: Some(false),
        additional_groups: Some(Vec::new()),
        ..Default::default()
    };
    let (_, status) =
        ops::update_exaconf(&path, |conf| ops::user::modify_user(conf, "_all", &update))?;
    assert_eq!(status, CommitStatus::Clean);

    let after = std::fs::metadata(&path)?;
    assert_eq!(before.ino(), after.ino());
    assert_eq!(before.mtime(), after.mtime());
    assert_eq!(before.mtime_nsec(), after.mtime_nsec());
    assert_eq!(std::fs::read_to_string(&path)?, text);
    Ok(())
}

#[test]
fn test_failed_operation_keeps_file() -> Result<(), Error> {
    let path = testfile("failed-operation");
    create_empty(&path)?;
    ops::update_exaconf(&path, |conf| ops::user::add_group(conf, "ops", 500))?;
    let text = std::fs::read_to_string(&path)?;

    let res = ops::update_exaconf(&path, |conf| ops::user::add_group(conf, "ops", 501));
    assert!(matches!(res, Err(ConfigError::Integrity(_))));

    // the first part of a failing operation is not written either
    let res = ops::update_exaconf(&path, |conf| {
        ops::user::add_group(conf, "dba", 502)?;
        ops::user::add_group(conf, "dba2", 500)
    });
    assert!(matches!(res, Err(ConfigError::Integrity(_))));

    assert_eq!(std::fs::read_to_string(&path)?, text);
    assert_eq!(ops::read_exaconf(&path)?.groups()?.len(), 1);
    Ok(())
}

#[test]
fn test_load_errors() -> Result<(), Error> {
    let path = testfile("missing");
    assert!(matches!(ops::read_exaconf(&path), Err(ConfigError::NotFound(_))));
    assert!(matches!(
        ops::update_exaconf(&path, |conf| ops::user::add_group(conf, "ops", 500)),
        Err(ConfigError::NotFound(_))
    ));

    let path = testfile("uninitialized");
    std::fs::write(&path, "[Global]\n    Revision = 0\n    Checksum = NONE\n")?;
    assert!(matches!(
        ops::read_exaconf(&path),
        Err(ConfigError::NotInitialized(_))
    ));

    let path = testfile("garbage");
    std::fs::write(&path, "[Global\n")?;
    assert!(matches!(ops::read_exaconf(&path), Err(ConfigError::Parse(_))));
    Ok(())
}

#[test]
fn test_remove_node_in_use() -> Result<(), Error> {
    let path = testfile("remove-node-in-use");
    create_empty(&path)?;
    let nodes = add_nodes(&path, 2)?;

    ops::update_exaconf(&path, |conf| {
        ops::volume::add_volume(conf, data_volume("DataVolume1", nodes.clone()))
    })?;

    let res = ops::update_exaconf(&path, |conf| ops::node::remove_node(conf, 12, false));
    assert!(matches!(res, Err(ConfigError::InUse { .. })));
    assert!(ops::read_exaconf(&path)?.node(12).is_ok());

    ops::update_exaconf(&path, |conf| ops::node::remove_node(conf, 12, true))?;

    let conf = ops::read_exaconf(&path)?;
    assert!(matches!(conf.node(12), Err(ConfigError::NotFound(_))));
    // forced removal does not cascade
    assert_eq!(conf.volume("DataVolume1")?.nodes, vec![11, 12]);
    Ok(())
}

#[test]
fn test_volume_master_nodes() -> Result<(), Error> {
    let path = testfile("volume-master-nodes");
    create_empty(&path)?;
    let nodes = add_nodes(&path, 3)?;
    assert_eq!(nodes, vec![11, 12, 13]);

    ops::update_exaconf(&path, |conf| {
        ops::volume::add_volume(conf, data_volume("DataVolume1", nodes.clone()))
    })?;
    assert_eq!(ops::read_exaconf(&path)?.volume("DataVolume1")?.num_master_nodes, 3);

    let update = VolumeUpdate {
        nodes: Some(vec![11, 12]),
        ..Default::default()
    };
    ops::update_exaconf(&path, |conf| {
        ops::volume::modify_volume(conf, "DataVolume1", &update)
    })?;

    let volume = ops::read_exaconf(&path)?.volume("DataVolume1")?;
    assert_eq!(volume.nodes, vec![11, 12]);
    assert_eq!(volume.num_master_nodes, 2);
    Ok(())
}

#[test]
fn test_duplicate_group() -> Result<(), Error> {
    let path = testfile("duplicate-group");
    create_empty(&path)?;

    ops::update_exaconf(&path, |conf| ops::user::add_group(conf, "ops", 500))?;
    match ops::update_exaconf(&path, |conf| ops::user::add_group(conf, "ops", 501)) {
        Err(ConfigError::Integrity(msg)) => assert!(msg.contains("ops")),
        other => panic!("unexpected result {:?}", other.map(|(_, status)| status)),
    }

    let groups = ops::read_exaconf(&path)?.groups()?;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].id, 500);
    Ok(())
}

#[test]
fn test_injected_lines_are_not_written() -> Result<(), Error> {
    let path = testfile("injected-lines");
    create_empty(&path)?;
    ops::update_exaconf(&path, |conf| ops::user::add_group(conf, "ops", 500))?;
    let text = std::fs::read_to_string(&path)?;

    let remote = |options: &str| NewRemoteVolume {
        name: None,
        id: None,
        vol_type: RemoteVolumeType::Smb,
        url: "smb://backup.example.com/exa".into(),
        owner: Owner::new(500, 500),
        username: None,
        password: None,
        options: Some(options.into()),
        labels: Vec::new(),
    };

    let injected = "a\n[Users]\n    [[root]]\n        ID = 0";
    let res = ops::update_exaconf(&path, |conf| {
        ops::remote_volume::add_remote_volume(conf, remote(injected))
    });
    assert!(matches!(res, Err(ConfigError::Integrity(_))));

    let res = ops::update_exaconf(&path, |conf| {
        ops::user::add_group(conf, "ops]]\n[Global", 777)
    });
    assert!(matches!(res, Err(ConfigError::Integrity(_))));
    assert_eq!(std::fs::read_to_string(&path)?, text);

    // a generated name is a valid section name and the file loads again
    let (name, _) = ops::update_exaconf(&path, |conf| {
        ops::remote_volume::add_remote_volume(conf, remote("vers=3.0, sec=ntlmssp"))
    })?;
    let conf = ops::read_exaconf(&path)?;
    assert_eq!(
        conf.remote_volume(&name)?.options.as_deref(),
        Some("vers=3.0, sec=ntlmssp")
    );
    assert!(conf.users()?.is_empty());
    Ok(())
}
