use std::ops::Index;

use yaml_rust::YamlLoader;

/// Fixed cluster membership plus this peer's slot in it.
#[derive(Clone, Debug)]
pub struct Configure {
    pub(crate) peer_cnt: usize,
    pub(crate) peer: Vec<String>,
    pub(crate) index: usize,
}

impl Configure {
    pub fn new(peer_cnt: usize, peer: Vec<String>, index: usize) -> Self {
        if peer.len() != peer_cnt {
            panic!("expected {} peer addresses, got {}", peer_cnt, peer.len());
        }
        if index >= peer_cnt {
            panic!("peer index {} out of range for {} peers", index, peer_cnt);
        }

        Self {
            peer_cnt,
            peer,
            index,
        }
    }
}

impl Index<usize> for Configure {
    type Output = str;

    fn index(&self, index: usize) -> &Self::Output {
        &self.peer[index]
    }
}

pub trait ConfigureSrc {
    fn get_configure(&self) -> Configure;
}

/// Read Configure from a yaml document.
pub struct YamlConfigureSrc {
    yaml: String,
}

impl YamlConfigureSrc {
    pub fn new(yaml: &str) -> Self {
        Self {
            yaml: yaml.to_owned(),
        }
    }
}

impl ConfigureSrc for YamlConfigureSrc {
    fn get_configure(&self) -> Configure {
        let yaml = YamlLoader::load_from_str(&self.yaml).unwrap();
        if yaml.len() != 1 {
            panic!("expected a single yaml document");
        }

        // have checked length
        let yaml = yaml.get(0).unwrap();

        let peer_cnt = yaml["peer_cnt"].as_i64().unwrap() as usize;

        let peer = yaml["peer"]
            .as_vec()
            .unwrap()
            .iter()
            .map(|y| y.as_str().unwrap().to_owned())
            .collect();

        let index = yaml["index"].as_i64().unwrap() as usize;

        Configure::new(peer_cnt, peer, index)
    }
}
